use serde::de::DeserializeOwned;
use serde::Serialize;

/// A domain type that persists through an explicit state snapshot.
///
/// The state is what actually gets serialized; the type itself never needs
/// to implement serde. Reconstruction must be total: any state produced by
/// [`to_state`](Self::to_state) must be accepted by
/// [`from_state`](Self::from_state).
pub trait Wrapped: Sized {
    type State: Serialize + DeserializeOwned;

    fn to_state(&self) -> Self::State;

    fn from_state(state: Self::State) -> Self;
}
