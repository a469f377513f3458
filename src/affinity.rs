/// Where a ring endpoint thread ended up running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// No core was configured.
    Floating,
    Pinned(usize),
    /// The core does not exist or the platform refused.
    Refused(usize),
}

/// Pin the calling thread, acting as `role`, to `core` if one was
/// configured. Failure is logged, never fatal.
pub fn pin_role(role: &str, core: Option<usize>) -> Placement {
    let Some(wanted) = core else {
        log::debug!("{role} thread left unpinned");
        return Placement::Floating;
    };

    let pinned = core_affinity::get_core_ids()
        .and_then(|ids| ids.into_iter().find(|id| id.id == wanted))
        .is_some_and(core_affinity::set_for_current);

    if pinned {
        log::info!("Pinned {role} thread to CPU core {wanted}");
        Placement::Pinned(wanted)
    } else {
        log::warn!("CPU pinning of {role} thread to core {wanted} failed or unavailable");
        Placement::Refused(wanted)
    }
}
