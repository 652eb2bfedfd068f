//! Self registering and deregistering metrics support.

use prometheus::{
    core::{Atomic, Collector, GenericCounter, GenericGauge},
    IntCounter, IntGauge, Registry,
};

/// A metric wrapper that will deregister the metric from a given registry on drop.
#[derive(Debug)]
pub(crate) struct RegisteredMetric<T>
where
    T: Collector + Clone + 'static,
{
    metric: T,
    registry: Registry,
}

impl<T> RegisteredMetric<T>
where
    T: Collector + Clone + 'static,
{
    /// Creates a new self-deregistering metric.
    pub(crate) fn new(registry: Registry, metric: T) -> Result<Self, prometheus::Error> {
        registry.register(Box::new(metric.clone()))?;
        Ok(RegisteredMetric { metric, registry })
    }
}

impl<P> RegisteredMetric<GenericCounter<P>>
where
    P: Atomic + 'static,
{
    /// Increments the counter.
    #[inline]
    pub(crate) fn inc(&self) {
        self.metric.inc()
    }

    /// Returns the counter value.
    #[inline]
    pub(crate) fn get(&self) -> P::T {
        self.metric.get()
    }
}

impl<P> RegisteredMetric<GenericGauge<P>>
where
    P: Atomic + 'static,
{
    /// Returns the gauge value.
    #[inline]
    pub(crate) fn get(&self) -> P::T {
        self.metric.get()
    }

    /// Sets the gauge value.
    #[inline]
    pub(crate) fn set(&self, v: P::T) {
        self.metric.set(v)
    }
}

impl<T> Drop for RegisteredMetric<T>
where
    T: Collector + Clone + 'static,
{
    fn drop(&mut self) {
        let desc = self
            .metric
            .desc()
            .first()
            .map(|desc| desc.fq_name.clone())
            .unwrap_or_default();
        self.registry
            .unregister(Box::new(self.metric.clone()))
            .unwrap_or_else(|_| tracing::error!("unregistering {} failed: was not registered", desc))
    }
}

/// Extension trait for [`Registry`] instances.
pub(crate) trait RegistryExt {
    /// Creates a new [`IntCounter`] registered to this registry.
    fn new_int_counter<S1: Into<String>, S2: Into<String>>(
        &self,
        name: S1,
        help: S2,
    ) -> Result<RegisteredMetric<IntCounter>, prometheus::Error>;

    /// Creates a new [`IntGauge`] registered to this registry.
    fn new_int_gauge<S1: Into<String>, S2: Into<String>>(
        &self,
        name: S1,
        help: S2,
    ) -> Result<RegisteredMetric<IntGauge>, prometheus::Error>;
}

impl RegistryExt for Registry {
    fn new_int_counter<S1: Into<String>, S2: Into<String>>(
        &self,
        name: S1,
        help: S2,
    ) -> Result<RegisteredMetric<IntCounter>, prometheus::Error> {
        RegisteredMetric::new(self.clone(), IntCounter::new(name, help)?)
    }

    fn new_int_gauge<S1: Into<String>, S2: Into<String>>(
        &self,
        name: S1,
        help: S2,
    ) -> Result<RegisteredMetric<IntGauge>, prometheus::Error> {
        RegisteredMetric::new(self.clone(), IntGauge::new(name, help)?)
    }
}
