// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `simplemem doctor` command implementation.
//!
//! Checks each capability and verifies that every indexed fact agrees
//! across the three views and with the store. Exits non-zero when anything fails.

use std::process::ExitCode;

use simplemem_core::HealthStatus;
use simplemem_memory::MemorySystem;

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl CheckStatus {
    fn label(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Warn => "WARN",
            CheckStatus::Fail => "FAIL",
        }
    }
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
}

fn health_check(name: String, status: HealthStatus) -> CheckResult {
    let (status, message) = match status {
        HealthStatus::Healthy => (CheckStatus::Pass, "healthy".to_string()),
        HealthStatus::Degraded(msg) => (CheckStatus::Warn, msg),
        HealthStatus::Unhealthy(msg) => (CheckStatus::Fail, msg),
    };
    CheckResult {
        name,
        status,
        message,
    }
}

pub async fn run_doctor(system: &MemorySystem) -> ExitCode {
    let mut results: Vec<CheckResult> = system
        .health()
        .await
        .into_iter()
        .map(|(kind, status)| health_check(format!("capability {kind}"), status))
        .collect();

    let (violations, consistency) = match system.check_consistency().await {
        Ok(violations) if violations.is_empty() => (
            violations,
            CheckResult {
                name: "index consistency".into(),
                status: CheckStatus::Pass,
                message: "store and all views agree".into(),
            },
        ),
        Ok(violations) => {
            let message = format!("{} fact(s) quarantined", violations.len());
            (
                violations,
                CheckResult {
                    name: "index consistency".into(),
                    status: CheckStatus::Fail,
                    message,
                },
            )
        }
        Err(err) => (
            Vec::new(),
            CheckResult {
                name: "index consistency".into(),
                status: CheckStatus::Fail,
                message: format!("could not read the store: {err}"),
            },
        ),
    };
    results.push(consistency);

    for result in &results {
        println!(
            "[{}] {:<24} {}",
            result.status.label(),
            result.name,
            result.message
        );
    }
    for violation in &violations {
        println!("       {violation}");
    }

    if results.iter().any(|r| r.status == CheckStatus::Fail) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_maps_to_check_status() {
        let pass = health_check("a".into(), HealthStatus::Healthy);
        assert_eq!(pass.status, CheckStatus::Pass);
        let warn = health_check("b".into(), HealthStatus::Degraded("slow".into()));
        assert_eq!((warn.status, warn.message.as_str()), (CheckStatus::Warn, "slow"));
        let fail = health_check("c".into(), HealthStatus::Unhealthy("down".into()));
        assert_eq!(fail.status, CheckStatus::Fail);
    }
}
