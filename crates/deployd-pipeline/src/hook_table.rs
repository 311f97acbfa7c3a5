//! The hook capability table of spec.md §4.4.

use deployd_schema::HookKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookCapabilities {
    pub can_mutate_document: bool,
    pub can_cancel: bool,
    pub can_surface_validation_errors: bool,
}

pub fn capabilities(hook: HookKind) -> HookCapabilities {
    match hook {
        HookKind::BeforeRequest => HookCapabilities {
            can_mutate_document: true,
            can_cancel: true,
            can_surface_validation_errors: false,
        },
        HookKind::Validate => HookCapabilities {
            can_mutate_document: true,
            can_cancel: true,
            can_surface_validation_errors: true,
        },
        HookKind::Get => HookCapabilities {
            can_mutate_document: true,
            can_cancel: true,
            can_surface_validation_errors: false,
        },
        HookKind::Post => HookCapabilities {
            can_mutate_document: true,
            can_cancel: true,
            can_surface_validation_errors: false,
        },
        HookKind::Put => HookCapabilities {
            can_mutate_document: true,
            can_cancel: true,
            can_surface_validation_errors: false,
        },
        HookKind::Delete => HookCapabilities {
            can_mutate_document: false,
            can_cancel: true,
            can_surface_validation_errors: false,
        },
        HookKind::AfterCommit => HookCapabilities {
            can_mutate_document: false,
            can_cancel: false,
            can_surface_validation_errors: false,
        },
    }
}

/// Faults (plugin build/load errors, script runtime panics) surface as a
/// 500 on write hooks and are swallowed with a warning everywhere else
/// (spec.md §4.6 step 4).
pub fn fault_is_client_visible(hook: HookKind) -> bool {
    matches!(
        hook,
        HookKind::Validate | HookKind::Post | HookKind::Put | HookKind::Delete
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn after_commit_cannot_mutate_or_cancel() {
        let caps = capabilities(HookKind::AfterCommit);
        assert!(!caps.can_mutate_document);
        assert!(!caps.can_cancel);
    }

    #[test]
    fn only_validate_surfaces_validation_errors() {
        for hook in HookKind::ALL {
            assert_eq!(capabilities(hook).can_surface_validation_errors, hook == HookKind::Validate);
        }
    }

    #[test]
    fn write_hooks_surface_faults_others_do_not() {
        assert!(fault_is_client_visible(HookKind::Post));
        assert!(!fault_is_client_visible(HookKind::Get));
        assert!(!fault_is_client_visible(HookKind::AfterCommit));
    }
}
