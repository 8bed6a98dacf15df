/// Coordinator states. Distinct from the union of the leaf states: the
/// bridge sequences the leaves and exposes only its own lifecycle.
///
/// `Errored` is an absorbing intermediate reachable from any non-`Idle`
/// state; every path out of it runs the same cleanup as `Stopping` and
/// lands back in `Idle`, so the bridge is never left partially torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    Initializing,
    Listening,
    Stopping,
    Errored,
}

impl BridgeState {
    pub fn is_idle(&self) -> bool {
        matches!(self, BridgeState::Idle)
    }

    pub fn is_listening(&self) -> bool {
        matches!(self, BridgeState::Listening)
    }
}
