use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::dom::ElementId;

use super::margin::RootMargin;

/// Observation parameters for one element
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserveOptions {
    /// Visible fraction that must be reached, in [0, 1]
    pub threshold: f64,
    pub root_margin: RootMargin,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            root_margin: RootMargin::ZERO,
        }
    }
}

/// What to do with a subscription after it fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPolicy {
    /// Tear down after the first qualifying transition
    Once,
    /// Fire on every not-visible to visible transition
    Repeat,
}

/// Feature that owns a subscription. One element may be subscribed by
/// several consumers, each with its own options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Consumer {
    LazyImage,
    Reveal,
}

/// One intersection observation reported by a backend
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionEntry {
    pub target: ElementId,
    /// Subscription the observation was made for
    pub consumer: Consumer,
    /// Visible fraction of the element in [0, 1]
    pub ratio: f64,
    pub is_intersecting: bool,
}

impl IntersectionEntry {
    pub fn qualifies(&self, options: &ObserveOptions) -> bool {
        self.is_intersecting && self.ratio >= options.threshold
    }
}

/// Element became visible for a consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub target: ElementId,
    pub consumer: Consumer,
}

/// Native visibility primitive (browser `IntersectionObserver`, geometry
/// simulation). Backends report entries asynchronously through the host.
pub trait ObserverBackend {
    fn observe(&mut self, target: &ElementId, consumer: Consumer, options: &ObserveOptions);
    fn unobserve(&mut self, target: &ElementId, consumer: Consumer);
}

/// Visibility capability, selected once at startup
pub enum Capability {
    Native(Box<dyn ObserverBackend>),
    /// No observation primitive: every subscription fires immediately
    Degraded,
}

impl Capability {
    pub fn native(backend: impl ObserverBackend + 'static) -> Self {
        Capability::Native(Box::new(backend))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Capability::Degraded)
    }
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Native(_) => f.write_str("Native"),
            Capability::Degraded => f.write_str("Degraded"),
        }
    }
}

#[derive(Debug, Clone)]
struct Subscription {
    options: ObserveOptions,
    policy: TriggerPolicy,
    visible: bool,
}

/// Subscription hub dispatching backend entries to consumers
#[derive(Debug)]
pub struct VisibilityObserver {
    capability: Capability,
    subscriptions: BTreeMap<(ElementId, Consumer), Subscription>,
}

impl VisibilityObserver {
    pub fn new(capability: Capability) -> Self {
        Self {
            capability,
            subscriptions: BTreeMap::new(),
        }
    }

    pub fn degraded() -> Self {
        Self::new(Capability::Degraded)
    }

    pub fn is_degraded(&self) -> bool {
        self.capability.is_degraded()
    }

    /// Subscribe an element.
    ///
    /// In degraded mode the notification is returned immediately and nothing
    /// is retained. Re-subscribing an element for the same consumer replaces
    /// its options; other consumers' subscriptions are untouched.
    pub fn observe(
        &mut self,
        target: ElementId,
        options: ObserveOptions,
        consumer: Consumer,
        policy: TriggerPolicy,
    ) -> Option<Notification> {
        match &mut self.capability {
            Capability::Degraded => {
                trace!(element = %target, ?consumer, "Degraded visibility, firing eagerly");
                Some(Notification { target, consumer })
            }
            Capability::Native(backend) => {
                backend.observe(&target, consumer, &options);
                self.subscriptions.insert(
                    (target, consumer),
                    Subscription {
                        options,
                        policy,
                        visible: false,
                    },
                );
                None
            }
        }
    }

    /// Drop one consumer's subscription; unknown ones are ignored
    pub fn unobserve(&mut self, target: &ElementId, consumer: Consumer) {
        if self.subscriptions.remove(&(target.clone(), consumer)).is_some() {
            if let Capability::Native(backend) = &mut self.capability {
                backend.unobserve(target, consumer);
            }
        }
    }

    pub fn is_observing(&self, target: &ElementId, consumer: Consumer) -> bool {
        self.subscriptions.contains_key(&(target.clone(), consumer))
    }

    pub fn observed_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Route backend entries to consumers, tearing down trigger-once
    /// subscriptions that fired
    pub fn dispatch(&mut self, entries: &[IntersectionEntry]) -> Vec<Notification> {
        let mut notifications = Vec::new();

        for entry in entries {
            let key = (entry.target.clone(), entry.consumer);
            let Some(subscription) = self.subscriptions.get_mut(&key) else {
                continue;
            };

            let qualifies = entry.qualifies(&subscription.options);
            let was_visible = subscription.visible;
            subscription.visible = qualifies;

            if !qualifies || was_visible {
                continue;
            }

            debug!(element = %entry.target, ratio = entry.ratio, consumer = ?entry.consumer, "Element became visible");
            notifications.push(Notification {
                target: entry.target.clone(),
                consumer: entry.consumer,
            });

            if subscription.policy == TriggerPolicy::Once {
                self.unobserve(&entry.target, entry.consumer);
            }
        }

        notifications
    }
}
