//! Per-entry capacity report.

use std::fmt;

use crate::capacity::{analyze, Capacity};
use crate::compile::{AccessEntry, AccessList, CompiledEntry};
use crate::error::Result;
use crate::types::Flow;

/// Capacity of one compiled variant and the flows it admitted
#[derive(Debug, Clone, PartialEq)]
pub struct EntryReport {
    pub rule: String,
    pub capacity: Capacity,
    pub flows: Vec<Flow>,
}

impl EntryReport {
    fn build(entry: &CompiledEntry) -> Result<Self> {
        Ok(Self {
            rule: entry.to_string(),
            capacity: analyze(entry)?,
            flows: entry.matched_flows(),
        })
    }
}

/// One configuration line with its compiled variants
#[derive(Debug, Clone, PartialEq)]
pub struct AceReport {
    pub line: String,
    pub entries: Vec<EntryReport>,
}

impl AceReport {
    fn build(ace: &AccessEntry) -> Result<Self> {
        Ok(Self {
            line: ace.line().to_string(),
            entries: ace
                .compiled()
                .iter()
                .map(EntryReport::build)
                .collect::<Result<_>>()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AclReport {
    pub name: String,
    pub aces: Vec<AceReport>,
}

/// Capacity analysis of every access list after a replay
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditReport {
    pub acls: Vec<AclReport>,
}

impl AuditReport {
    /// Analyze every compiled entry of `lists`.
    ///
    /// Fails on the first entry whose protocol cannot be sized.
    pub fn build(lists: &[AccessList]) -> Result<Self> {
        let mut acls = Vec::with_capacity(lists.len());
        for list in lists {
            acls.push(AclReport {
                name: list.name().to_string(),
                aces: list
                    .entries()
                    .iter()
                    .map(AceReport::build)
                    .collect::<Result<_>>()?,
            });
        }
        Ok(Self { acls })
    }

    /// All compiled variants, in list order
    pub fn entries(&self) -> impl Iterator<Item = &EntryReport> {
        self.acls
            .iter()
            .flat_map(|acl| acl.aces.iter())
            .flat_map(|ace| ace.entries.iter())
    }
}

impl fmt::Display for EntryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\t ACE: capacity {:#x}, {}", self.capacity.theoretical, self.rule)?;
        writeln!(
            f,
            "\t # of flows: {}, capacity: {:#x}, ACE capacity utilization(%): {:.3}",
            self.capacity.flows,
            self.capacity.observed,
            self.capacity.utilization()
        )?;
        for flow in &self.flows {
            writeln!(f, "\t\t {}", flow)?;
        }
        Ok(())
    }
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for acl in &self.acls {
            writeln!(f, "ACL: {}", acl.name)?;
            for ace in &acl.aces {
                writeln!(f, "\tACE: {}", ace.line)?;
                for entry in &ace.entries {
                    write!(f, "{}", entry)?;
                }
            }
        }
        Ok(())
    }
}
