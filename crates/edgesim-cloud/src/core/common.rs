use std::fmt::{Display, Formatter};

use serde::Serialize;

/// Result of checking whether a VM fits on a host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AllocationVerdict {
    NotEnoughPes,
    PesTooSlow,
    NotEnoughRam,
    NotEnoughBandwidth,
    NotEnoughStorage,
    Success,
}

impl Display for AllocationVerdict {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            AllocationVerdict::NotEnoughPes => write!(f, "not enough PEs"),
            AllocationVerdict::PesTooSlow => write!(f, "PEs are too slow"),
            AllocationVerdict::NotEnoughRam => write!(f, "not enough RAM"),
            AllocationVerdict::NotEnoughBandwidth => write!(f, "not enough bandwidth"),
            AllocationVerdict::NotEnoughStorage => write!(f, "not enough storage"),
            AllocationVerdict::Success => write!(f, "success"),
        }
    }
}

/// Kind of simulated entity, used in error reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum EntityKind {
    Host,
    Vm,
    Cloudlet,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            EntityKind::Host => write!(f, "host"),
            EntityKind::Vm => write!(f, "vm"),
            EntityKind::Cloudlet => write!(f, "cloudlet"),
        }
    }
}
