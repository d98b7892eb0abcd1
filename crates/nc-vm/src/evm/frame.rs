//! Contract execution frames and the explicit call stack entries.

use std::sync::Arc;

use primitive_types::U256;
use shared_types::{AssetId, Hash, Name};

use super::analysis::JumpDests;

/// How a frame was entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    /// Plain call; runs the callee's code in the callee's storage.
    Call,
    /// Runs the callee's code in the caller's storage.
    CallCode,
    /// Like `CallCode`, keeping the parent's caller and value.
    DelegateCall,
    /// Read-only call; the whole nested tree is write protected.
    StaticCall,
    /// Runs init code and installs the returned code.
    Create,
}

/// Call stack entry. The stack is indexed by depth; a frame looks up its
/// parent by index rather than holding a reference to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameMeta {
    /// Entry kind.
    pub kind: CallKind,
    /// `CALLER` as seen by the frame.
    pub caller: Name,
    /// Account whose storage the frame uses (`ADDRESS`).
    pub address: Name,
    /// Account whose code runs; receives the frame's gas attribution.
    pub code_owner: Name,
    /// `CALLVALUE`.
    pub value: U256,
    /// Asset of `value`.
    pub asset_id: AssetId,
    /// Static-call protection, inherited by every child.
    pub read_only: bool,
}

/// Running state of one invocation.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Stack entry describing this frame.
    pub meta: FrameMeta,
    /// Code being executed.
    pub code: Arc<Vec<u8>>,
    /// Hash of `code`; keys the jump-destination cache.
    pub code_hash: Hash,
    /// Call data.
    pub input: Vec<u8>,
    /// Gas left.
    pub gas: u64,
    /// Valid jump targets of `code`.
    pub jump_dests: Arc<JumpDests>,
}

impl Frame {
    /// Deduct `gas`; false (and nothing deducted) if not enough is left.
    pub fn use_gas(&mut self, gas: u64) -> bool {
        if self.gas < gas {
            return false;
        }
        self.gas -= gas;
        true
    }
}
