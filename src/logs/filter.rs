use std::collections::BTreeMap;

use log::{debug, info, warn};
use regex::Regex;

use crate::config::{FilterBlock, LogFilterSpec};
use crate::errors::FatalError;
use crate::logs::LogEntry;

#[derive(Debug, Clone)]
struct CompiledBlock {
    include: Option<Regex>,
    /// `None` when the block leaves the exclude pass to the default
    exclude: Option<Option<Regex>>,
}

impl CompiledBlock {
    fn compile(block: &FilterBlock) -> Result<Self, FatalError> {
        let include = block.include.as_deref().map(compile_pattern).transpose()?;
        let exclude = match &block.exclude {
            None => None,
            Some(None) => Some(None),
            Some(Some(pattern)) => Some(Some(compile_pattern(pattern)?)),
        };
        Ok(Self { include, exclude })
    }

    fn include_into(&self, inventory: &[LogEntry], kept: &mut BTreeMap<String, u64>) {
        let Some(include) = &self.include else {
            return;
        };
        for entry in inventory {
            if include.is_match(&entry.path) {
                kept.insert(entry.path.clone(), entry.size);
            } else {
                debug!("filter {} by {}", entry.path, include);
            }
        }
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, FatalError> {
    Regex::new(pattern).map_err(|source| FatalError::FilterPattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn exclude_from(exclude: &Regex, kept: &mut BTreeMap<String, u64>) {
    kept.retain(|path, _| {
        let drop = exclude.is_match(path);
        if drop {
            info!("excluding log {} by {}", path, exclude);
        }
        !drop
    });
}

/// Compiled include/exclude cascade shared by the whole fleet.
///
/// Role blocks replace the default block independently for each pass, so a
/// node may take its include decision from a role and its exclude decision
/// from the default.
#[derive(Debug, Clone)]
pub struct LogFilter {
    by_role: BTreeMap<String, CompiledBlock>,
    default: Option<CompiledBlock>,
}

impl LogFilter {
    /// Compile every pattern up front; any malformed one is fatal
    pub fn compile(spec: &LogFilterSpec) -> Result<Self, FatalError> {
        let by_role = spec
            .by_role
            .iter()
            .map(|(role, block)| -> Result<_, FatalError> { Ok((role.clone(), CompiledBlock::compile(block)?)) })
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        let default = spec.default.as_ref().map(CompiledBlock::compile).transpose()?;
        if !spec.by_node_id.is_empty() {
            debug!("by_node_id log filters present but not evaluated: {:?}", spec.by_node_id.keys());
        }
        Ok(Self { by_role, default })
    }

    /// Narrow a node's log inventory into `kept` (path to bytes)
    pub fn apply(&self, roles: &[String], inventory: &[LogEntry], kept: &mut BTreeMap<String, u64>) {
        let role_blocks: Vec<&CompiledBlock> = roles.iter().filter_map(|role| self.by_role.get(role)).collect();

        if !role_blocks.is_empty() {
            for block in &role_blocks {
                block.include_into(inventory, kept);
            }
        } else if let Some(default) = &self.default {
            default.include_into(inventory, kept);
        } else {
            warn!("default log filter is not defined");
            kept.clear();
        }

        let role_excludes: Vec<&Option<Regex>> = role_blocks.iter().filter_map(|b| b.exclude.as_ref()).collect();
        if !role_excludes.is_empty() {
            for exclude in role_excludes.into_iter().flatten() {
                exclude_from(exclude, kept);
            }
        } else if let Some(Some(Some(exclude))) = self.default.as_ref().map(|d| d.exclude.as_ref()) {
            exclude_from(exclude, kept);
        }
    }
}
