//! One-shot missed-task sweep.

use anyhow::Result;
use serde::Serialize;

use crate::cli::context::AppContext;
use crate::cli::output::{output, CommandOutput};
use crate::domain::dates::format_date;

#[derive(Debug, Serialize)]
pub struct SweepOutput {
    pub today: String,
    pub transitioned: usize,
}

impl CommandOutput for SweepOutput {
    fn to_human(&self) -> String {
        match self.transitioned {
            0 => format!("No overdue tasks as of {}.", self.today),
            1 => format!("Marked 1 overdue task as missed (as of {}).", self.today),
            n => format!("Marked {n} overdue tasks as missed (as of {}).", self.today),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(ctx: &AppContext, json_mode: bool) -> Result<()> {
    // Surface store failures here instead of swallowing them like a load-time sweep.
    let transitioned = ctx.sweeper().try_sweep().await?;
    let out = SweepOutput {
        today: format_date(ctx.clock.today()),
        transitioned,
    };
    output(&out, json_mode);
    Ok(())
}
