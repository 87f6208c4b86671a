//! The optional file share step, offered when a share service is available.
//!
//! Each share is posted as three consecutive numbered keys: `shares_<n>`
//! holds the share id, `shares_<n+1>` the mount path and `shares_<n+2>` the
//! access level, with `n` a multiple of three. Unchecked shares post nothing.

use serde_json::Value;

use super::context::{FormData, WorkflowContext};
use super::control::MultiSelectControl;
use super::parameter::Choice;
use super::step::{Field, FieldIssue, Step};
use crate::types::Share;

pub const SLUG: &str = "shares";
pub const PREFIX: &str = "shares_";
/// Context key holding the parsed share list.
pub const SELECTED_KEY: &str = "shares_selected";

/// Builds the share step from the shares the operator may mount.
pub fn shares_step(available: &[Choice], description: &str) -> Step {
    Step::fixed(SLUG, "Shares", PREFIX)
        .field(
            Field::new("available", "Select Shares", MultiSelectControl::new(available.to_vec()))
                .help(description),
        )
        .validator(share_rows)
}

fn share_rows(
    form: &FormData,
    prefix: &str,
) -> std::result::Result<Vec<(String, Value)>, Vec<FieldIssue>> {
    let mut slots: Vec<u32> = form
        .keys()
        .filter_map(|key| key.strip_prefix(prefix)?.parse::<u32>().ok())
        .filter(|slot| slot % 3 == 0)
        .collect();
    slots.sort_unstable();

    let mut shares = Vec::new();
    let mut issues = Vec::new();
    for slot in slots {
        let Some(id) = form.get(&format!("{prefix}{slot}")) else {
            continue;
        };
        let access_key = format!("{prefix}{}", slot + 2);
        let access_level = match form.get(&access_key) {
            None => Share::READ_WRITE,
            Some(level @ (Share::READ_WRITE | Share::READ_ONLY)) => level,
            Some(_) => {
                issues.push(FieldIssue::new(access_key, "Select read-write or read-only access."));
                continue;
            }
        };
        shares.push(Share {
            id: id.to_string(),
            path: form.get(&format!("{prefix}{}", slot + 1)).map(str::to_string),
            access_level: access_level.to_string(),
        });
    }

    if !issues.is_empty() {
        return Err(issues);
    }
    let value = serde_json::to_value(&shares)
        .map_err(|err| vec![FieldIssue::new(SELECTED_KEY, err.to_string())])?;
    Ok(vec![("selected".to_string(), value)])
}

/// Shares parsed by the share step, empty when the step was not shown.
pub fn selected_shares(context: &WorkflowContext) -> std::result::Result<Vec<Share>, Vec<FieldIssue>> {
    match context.get(SELECTED_KEY) {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|err| vec![FieldIssue::new(SELECTED_KEY, err.to_string())]),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn checked_rows_become_shares() {
        let form = FormData::new()
            .with("shares_0", "")
            .with("shares_1", "/mnt/unused")
            .with("shares_3", "8a1c2f3e")
            .with("shares_4", "/mnt/data")
            .with("shares_5", "ro")
            .with("shares_6", "b7d4e5f6")
            .with("shares_7", "");
        let values = share_rows(&form, PREFIX).unwrap();
        assert_eq!(values[0].0, "selected");
        assert_eq!(
            values[0].1,
            json!([
                {"id": "8a1c2f3e", "path": "/mnt/data", "access_level": "ro"},
                {"id": "b7d4e5f6", "access_level": "rw"}
            ])
        );
    }

    #[test]
    fn unknown_access_level_is_rejected() {
        let form = FormData::new().with("shares_0", "8a1c2f3e").with("shares_2", "rwx");
        let issues = share_rows(&form, PREFIX).unwrap_err();
        assert_eq!(issues[0].field, "shares_2");
    }

    #[test]
    fn step_output_lands_under_selected_key() {
        let step = shares_step(&[Choice::new("8a1c2f3e", "datasets")], "Select the shares");
        let values = step.clean(&FormData::new().with("shares_0", "8a1c2f3e")).unwrap();
        let mut ctx = WorkflowContext::default();
        for (key, value) in values {
            ctx.insert(key, value).unwrap();
        }
        let shares = selected_shares(&ctx).unwrap();
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].id, "8a1c2f3e");
        assert!(selected_shares(&WorkflowContext::default()).unwrap().is_empty());
    }
}
