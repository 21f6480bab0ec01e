//! Concrete and composite actions.

pub mod assert;
pub mod input;
pub mod multitouch;
pub mod report;
pub mod scroll;
pub mod sync;
pub mod touch;
pub mod wait;

pub use assert::{AssertAction, GetterAction, GetterSource, Value};
pub use input::{KeyPressAction, SetTextAction};
pub use multitouch::MultitouchAction;
pub use report::{LogAction, ScreenshotAction, StepAction};
pub use scroll::ScrollControlAction;
pub use sync::{
    HelperSet, PollPhase, PublishAction, RendezvousAction, RendezvousCondition, SyncTarget,
};
pub use touch::{MoveTarget, TouchDownAction, TouchMoveAction, TouchTarget, TouchUpAction};
pub use wait::{
    ControlAppears, Deadline, ScreenIs, WaitAction, WaitCondition, WaitForScreenAction,
    WaitForUiAction, WaitUntilAction,
};
