//! Determinism check: build the feed twice and compare the identifier sets.
//! Identical inputs must yield identical UIDs across independent runs.

use crate::pipeline::{BuildOptions, build_feed};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct HarnessOptions {
    pub config_path: Option<PathBuf>,
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct HarnessReport {
    pub first_run_events: usize,
    pub second_run_events: usize,
    pub uids_stable: bool,
    pub first_run_bytes: u64,
    pub second_run_bytes: u64,
}

pub fn run_harness(options: &HarnessOptions) -> Result<HarnessReport> {
    std::fs::create_dir_all(&options.out_dir).with_context(|| {
        format!(
            "failed to create harness dir {}",
            options.out_dir.display()
        )
    })?;

    let first_path = options.out_dir.join("run-a.ics");
    let second_path = options.out_dir.join("run-b.ics");

    let first = build_feed(&BuildOptions {
        config_path: options.config_path.clone(),
        out_path: Some(first_path.clone()),
    })?;
    let second = build_feed(&BuildOptions {
        config_path: options.config_path.clone(),
        out_path: Some(second_path.clone()),
    })?;

    let first_uids = read_uids(&first_path)?;
    let second_uids = read_uids(&second_path)?;

    Ok(HarnessReport {
        first_run_events: first.events_written,
        second_run_events: second.events_written,
        uids_stable: first_uids == second_uids,
        first_run_bytes: first.bytes_written,
        second_run_bytes: second.bytes_written,
    })
}

fn read_uids(path: &Path) -> Result<BTreeSet<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    Ok(content
        .lines()
        .filter_map(|line| line.strip_prefix("UID:"))
        .map(|uid| uid.trim().to_string())
        .collect())
}
