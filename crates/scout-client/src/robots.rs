//! Minimal robots.txt parser.
//!
//! Prefix-based allow/disallow rules per user-agent group, with allow rules
//! taking precedence. The fetcher only ever issues GET requests, so
//! directives beyond the rule groups are ignored.

use std::collections::HashMap;

/// Parsed robots.txt rules.
#[derive(Debug, Clone, Default)]
pub struct RobotsTxt {
    /// Rules per user-agent (lowercase).
    rules: HashMap<String, AgentRules>,
    /// Rules for `*`.
    default_rules: AgentRules,
}

#[derive(Debug, Clone, Default)]
struct AgentRules {
    disallow: Vec<String>,
    allow: Vec<String>,
}

impl RobotsTxt {
    pub fn parse(content: &str) -> Self {
        let mut robots = Self::default();
        let mut current_agents: Vec<String> = Vec::new();
        let mut current_rules = AgentRules::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match directive.trim().to_lowercase().as_str() {
                "user-agent" => {
                    // A new agent line after rules closes the previous group.
                    if !current_agents.is_empty()
                        && !(current_rules.allow.is_empty() && current_rules.disallow.is_empty())
                    {
                        robots.store_group(&current_agents, current_rules);
                        current_rules = AgentRules::default();
                        current_agents = Vec::new();
                    }
                    current_agents.push(value.to_lowercase());
                }
                "disallow" => {
                    if !value.is_empty() {
                        current_rules.disallow.push(value.to_string());
                    }
                }
                "allow" => {
                    if !value.is_empty() {
                        current_rules.allow.push(value.to_string());
                    }
                }
                _ => {}
            }
        }
        robots.store_group(&current_agents, current_rules);
        robots
    }

    fn store_group(&mut self, agents: &[String], rules: AgentRules) {
        for agent in agents {
            if agent == "*" {
                self.default_rules = rules.clone();
            } else {
                self.rules.insert(agent.clone(), rules.clone());
            }
        }
    }

    /// Whether a path is allowed for a user-agent. Allow rules override
    /// disallow rules; an agent with no matching group falls back to `*`.
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let agent = user_agent.to_lowercase();
        let rules = self
            .rules
            .get(&agent)
            .or_else(|| {
                self.rules
                    .iter()
                    .find(|(name, _)| agent.contains(name.as_str()))
                    .map(|(_, rules)| rules)
            })
            .unwrap_or(&self.default_rules);

        let path = if path.is_empty() { "/" } else { path };
        if rules.allow.iter().any(|prefix| path.starts_with(prefix)) {
            return true;
        }
        !rules
            .disallow
            .iter()
            .any(|prefix| prefix == "/" || path.starts_with(prefix))
    }
}
