//! Show selected specialist roles

use super::read_requirements;
use crate::cli::app::RequirementArgs;
use anyhow::{bail, Result};
use architect_core::pipeline::roles::{role_by_name, select_roles};

pub async fn execute(args: RequirementArgs) -> Result<()> {
    let requirements = read_requirements(&args).await?;
    if requirements.iter().all(|r| r.trim().is_empty()) {
        bail!("No requirements given. Use 'architect roles \"requirement\"' or 'architect roles -f file.md'");
    }

    println!("👥 Selected roles:");
    for (index, name) in select_roles(&requirements).iter().enumerate() {
        match role_by_name(name) {
            Some(role) => println!("  {}. {} - {}", index + 1, role.name, role.expertise),
            None => println!("  {}. {}", index + 1, name),
        }
    }

    Ok(())
}
