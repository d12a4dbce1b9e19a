use log::trace;

use nobifinder_core::{Target, UsageHit};

use crate::types::{Anchor, FileEvidence, RawHit};

/// How much evidence a file needs before its candidate hits are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterPolicy {
    /// Require an import or fully-qualified reference (or, with
    /// `same_package_ok`, a shared package). Unbound receivers are dropped.
    pub strict_import: bool,
    /// Count a file in the target's package as qualified
    pub same_package_ok: bool,
    /// Let a bare simple-name occurrence promote hits in permissive mode
    pub bare_names: bool,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self { strict_import: false, same_package_ok: false, bare_names: true }
    }
}

impl FilterPolicy {
    fn keeps(
        &self,
        anchor: Anchor,
        evidence: &FileEvidence,
        same_package: bool,
    ) -> bool {
        if anchor == Anchor::Qualified {
            return true;
        }
        let package_ok = self.same_package_ok && same_package;
        if self.strict_import {
            (evidence.qualified || package_ok) && anchor != Anchor::UnboundReceiver
        } else {
            evidence.qualified
                || package_ok
                || (self.bare_names && evidence.simple_name_seen && !evidence.conflicting_import)
        }
    }
}

/// Drops the hits of one file that its evidence does not support. Each hit
/// is judged on its own; the file's package decides same-package relaxation.
pub fn apply(
    hits: Vec<RawHit>,
    target: &Target,
    file_package: Option<&str>,
    evidence: &FileEvidence,
    policy: &FilterPolicy,
) -> Vec<UsageHit> {
    let same_package = file_package.unwrap_or("") == target.package;
    let total = hits.len();
    let kept: Vec<UsageHit> = hits
        .into_iter()
        .filter(|raw| policy.keeps(raw.anchor, evidence, same_package))
        .map(|raw| raw.hit)
        .collect();
    trace!("Filter kept {} of {} hits ({:?}, {:?})", kept.len(), total, policy, evidence);
    kept
}
