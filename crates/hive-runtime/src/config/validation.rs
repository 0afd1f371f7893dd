//! Configuration validation utilities.

use std::collections::HashSet;

use hive_core::{Action, BeeConfig, Chain};

use super::error::{ConfigError, ConfigResult};
use super::schema::{HiveConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &HiveConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    if config.logs.capacity == 0 {
        return Err(ConfigError::validation("logs.capacity must be greater than 0"));
    }
    validate_bees(&config.bees)?;
    let action_ids = validate_actions(&config.actions)?;
    validate_chains(&config.chains, &action_ids)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

fn validate_bees(bees: &[BeeConfig]) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for bee in bees {
        if bee.name.is_empty() {
            return Err(ConfigError::missing_field("bees.name"));
        }
        if bee.class.is_empty() {
            return Err(ConfigError::missing_field(format!("bees.{}.class", bee.name)));
        }
        if !seen.insert(bee.name.as_str()) {
            return Err(ConfigError::DuplicateBee(bee.name.clone()));
        }
    }
    Ok(())
}

/// Returns the set of action ids for chain reference checks.
fn validate_actions(actions: &[Action]) -> ConfigResult<HashSet<&str>> {
    let mut ids = HashSet::new();
    for action in actions {
        if action.id.is_empty() {
            return Err(ConfigError::missing_field(format!(
                "actions.id (action {:?} on bee {:?})",
                action.name, action.bee
            )));
        }
        if !ids.insert(action.id.as_str()) {
            return Err(ConfigError::DuplicateAction(action.id.clone()));
        }
    }
    Ok(ids)
}

fn validate_chains(chains: &[Chain], action_ids: &HashSet<&str>) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for chain in chains {
        if chain.name.is_empty() {
            return Err(ConfigError::missing_field("chains.name"));
        }
        if !seen.insert(chain.name.as_str()) {
            return Err(ConfigError::DuplicateChain(chain.name.clone()));
        }
        if chain.event.bee.is_empty() || chain.event.name.is_empty() {
            return Err(ConfigError::validation(format!(
                "Chain {:?} needs both an event bee and an event name",
                chain.name
            )));
        }
        if let Some(missing) = chain
            .actions
            .iter()
            .find(|id| !action_ids.contains(id.as_str()))
        {
            return Err(ConfigError::UnknownAction {
                chain: chain.name.clone(),
                action: missing.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_core::{ChainElement, EventPattern};

    fn valid() -> HiveConfig {
        HiveConfig {
            bees: vec![BeeConfig::new("ticker", "ticker"), BeeConfig::new("echo", "echo")],
            actions: vec![Action::new("echo", "say").with_id("a1")],
            chains: vec![
                Chain::new("echo-ticks", EventPattern::new("ticker", "tick")).with_action("a1"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_empty_config() {
        assert!(validate_config(&HiveConfig::default()).is_ok());
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_validate_bees() {
        let mut config = valid();
        config.bees.push(BeeConfig::new("ticker", "ticker"));
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::DuplicateBee(name)) if name == "ticker"
        ));

        let mut config = valid();
        config.bees[0].name.clear();
        assert!(matches!(validate_config(&config), Err(ConfigError::MissingField { .. })));

        let mut config = valid();
        config.bees[1].class.clear();
        assert!(matches!(validate_config(&config), Err(ConfigError::MissingField { .. })));
    }

    #[test]
    fn test_validate_actions() {
        let mut config = valid();
        config.actions.push(Action::new("echo", "say").with_id("a1"));
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::DuplicateAction(id)) if id == "a1"
        ));

        let mut config = valid();
        config.actions[0].id.clear();
        assert!(matches!(validate_config(&config), Err(ConfigError::MissingField { .. })));
    }

    #[test]
    fn test_validate_chains() {
        let mut config = valid();
        config.chains.push(config.chains[0].clone());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::DuplicateChain(name)) if name == "echo-ticks"
        ));

        let mut config = valid();
        config.chains[0].event.name.clear();
        assert!(matches!(validate_config(&config), Err(ConfigError::ValidationError { .. })));

        let mut config = valid();
        config.chains[0].actions.push("ghost".into());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::UnknownAction { chain, action }) if chain == "echo-ticks" && action == "ghost"
        ));
    }

    #[test]
    fn test_legacy_elements_are_not_references() {
        let mut config = valid();
        config.chains[0].elements.push(ChainElement {
            action: Some(Action::new("echo", "say")),
            filter: None,
        });
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_logging() {
        let mut config = HiveConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(validate_config(&config), Err(ConfigError::MissingField { field }) if field == "logging.file_path"));

        config.logging.file_path = Some("hive.log".into());
        assert!(validate_config(&config).is_ok());

        config.logs.capacity = 0;
        assert!(validate_config(&config).is_err());
    }
}
