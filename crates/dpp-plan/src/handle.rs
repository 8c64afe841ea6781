//! Opaque handles and the per-instance handle table.
//!
//! A [`PlanHandle`] carries the [`InstanceId`] it was issued by and a serial
//! drawn from that instance. Serials are monotonic and never reused while
//! the instance lives, so a destroyed handle stays invalid forever and a
//! handle from one instance never resolves in another.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};
use crate::plan::Plan;

/// Next instance id; 0 is reserved for the invalid sentinel.
static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of one plan manager instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Never issued to a live instance.
    pub const INVALID: InstanceId = InstanceId(0);

    pub(crate) fn next() -> Self {
        InstanceId(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance#{}", self.0)
    }
}

/// Opaque handle to a plan.
///
/// # Example
///
/// ```
/// use dpp_plan::PlanHandle;
///
/// assert!(!PlanHandle::INVALID.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlanHandle {
    instance: InstanceId,
    serial: u64,
}

impl PlanHandle {
    /// Returned in place of a handle whenever creation fails.
    pub const INVALID: PlanHandle = PlanHandle {
        instance: InstanceId::INVALID,
        serial: 0,
    };

    /// False only for the sentinel. A valid-looking handle may still be
    /// unregistered.
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Instance this handle was issued by.
    #[inline]
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    #[inline]
    pub fn serial(&self) -> u64 {
        self.serial
    }
}

impl fmt::Display for PlanHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "plan#{}.{}", self.instance.0, self.serial)
        } else {
            write!(f, "plan#invalid")
        }
    }
}

/// Registry of the live plans of one instance, keyed by handle.
///
/// Parents refer to their nested plans by handle, so the table is the arena
/// every plan of the instance lives in.
#[derive(Debug)]
pub(crate) struct HandleTable {
    instance: InstanceId,
    next_serial: u64,
    plans: BTreeMap<PlanHandle, Plan>,
}

impl HandleTable {
    pub(crate) fn new(instance: InstanceId) -> Self {
        Self {
            instance,
            next_serial: 1,
            plans: BTreeMap::new(),
        }
    }

    /// Draw the next handle. Reserved serials are consumed even if the plan
    /// they were drawn for is never inserted.
    pub(crate) fn reserve(&mut self) -> PlanResult<PlanHandle> {
        let serial = self.next_serial;
        self.next_serial = serial.checked_add(1).ok_or_else(|| {
            PlanError::Unknown(format!("handle space of {} exhausted", self.instance))
        })?;
        Ok(PlanHandle {
            instance: self.instance,
            serial,
        })
    }

    pub(crate) fn insert(&mut self, plan: Plan) {
        self.plans.insert(plan.handle(), plan);
    }

    pub(crate) fn get(&self, handle: PlanHandle) -> PlanResult<&Plan> {
        self.plans
            .get(&handle)
            .ok_or(PlanError::InvalidHandle { handle })
    }

    pub(crate) fn get_mut(&mut self, handle: PlanHandle) -> PlanResult<&mut Plan> {
        self.plans
            .get_mut(&handle)
            .ok_or(PlanError::InvalidHandle { handle })
    }

    pub(crate) fn remove(&mut self, handle: PlanHandle) -> Option<Plan> {
        self.plans.remove(&handle)
    }

    pub(crate) fn contains(&self, handle: PlanHandle) -> bool {
        self.plans.contains_key(&handle)
    }

    pub(crate) fn len(&self) -> usize {
        self.plans.len()
    }

    pub(crate) fn handles(&self) -> impl Iterator<Item = PlanHandle> + '_ {
        self.plans.keys().copied()
    }
}
