//! Tool visibility filtering for a downstream server's configured
//! allow/deny lists.

use config::ToolFilterConfig;

/// Two-phase check: allow (if non-empty) must admit the name, then deny
/// (if it matches) removes it regardless.
pub fn is_tool_allowed(filter: &ToolFilterConfig, tool_name: &str) -> bool {
    if !filter.allow.is_empty() && !filter.allow.iter().any(|name| name == tool_name) {
        return false;
    }

    !filter.deny.iter().any(|name| name == tool_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_restrictions_allows_everything() {
        let filter = ToolFilterConfig::default();
        assert!(is_tool_allowed(&filter, "anything"));
    }

    #[test]
    fn allow_list_restricts_to_named_tools() {
        let filter = ToolFilterConfig {
            allow: vec!["read_file".to_string()],
            deny: vec![],
        };
        assert!(is_tool_allowed(&filter, "read_file"));
        assert!(!is_tool_allowed(&filter, "write_file"));
    }

    #[test]
    fn deny_overrides_allow() {
        let filter = ToolFilterConfig {
            allow: vec!["read_file".to_string()],
            deny: vec!["read_file".to_string()],
        };
        assert!(!is_tool_allowed(&filter, "read_file"));
    }

    #[test]
    fn deny_alone_blocks_named_tool() {
        let filter = ToolFilterConfig {
            allow: vec![],
            deny: vec!["delete_file".to_string()],
        };
        assert!(is_tool_allowed(&filter, "read_file"));
        assert!(!is_tool_allowed(&filter, "delete_file"));
    }
}
