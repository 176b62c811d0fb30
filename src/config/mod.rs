//! Configuration discovery: the registry of declared per-type configurations
//! and the run-once build that populates a plan cache from them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use log::debug;

use crate::builder::EntityBuilder;
use crate::core::Result;
use crate::entity::Entity;
use crate::plan::PlanCache;

/// One declared entity configuration. Implementations are no-argument
/// constructible so the configurator can instantiate them during discovery.
///
/// ```ignore
/// #[derive(Default)]
/// struct DeviceConfig;
///
/// impl EntityConfiguration<Device> for DeviceConfig {
///     fn configure(&self, builder: &mut EntityBuilder<Device>) {
///         builder.map_to_table("devices").map_uuid_generator("id");
///     }
/// }
/// ```
pub trait EntityConfiguration<T: Entity>: Send + Sync {
    fn configure(&self, builder: &mut EntityBuilder<T>);
}

type BuildFn = Box<dyn Fn(&PlanCache) -> Result<()> + Send + Sync>;

/// Registry of declared configurations with a run-once build.
///
/// `build_all` is triggered lazily by the first `bulk_insert` that finds the
/// "discovery has run" flag unset; it can also be called explicitly at
/// startup. Concurrent callers build at most once. A failing configuration
/// aborts discovery and leaves the flag unset.
pub struct Configurator {
    registered: Mutex<Vec<BuildFn>>,
    build_lock: Mutex<()>,
    built: AtomicBool,
}

impl Configurator {
    pub fn new() -> Self {
        Self {
            registered: Mutex::new(Vec::new()),
            build_lock: Mutex::new(()),
            built: AtomicBool::new(false),
        }
    }

    /// Register a configuration type; it is instantiated and run when
    /// discovery builds.
    pub fn register<T, C>(&self)
    where
        T: Entity,
        C: EntityConfiguration<T> + Default + 'static,
    {
        self.register_config::<T, C>(C::default());
    }

    /// Register an already-constructed configuration instance.
    pub fn register_config<T, C>(&self, config: C)
    where
        T: Entity,
        C: EntityConfiguration<T> + 'static,
    {
        let build: BuildFn = Box::new(move |cache| {
            let mut builder = EntityBuilder::<T>::new();
            config.configure(&mut builder);
            builder.build(cache)
        });
        self.registered.lock().unwrap().push(build);
    }

    /// Run every registered configuration that has not run yet, then set the
    /// "discovery has run" flag. Each configuration runs at most once per
    /// process; duplicate plan registrations inside are no-ops anyway.
    ///
    /// A failing configuration is reported once and dropped. The ones not yet
    /// run stay registered and the flag stays unset, so the next build (or the
    /// next lazy `bulk_insert`) still picks them up.
    pub fn build_all(&self, cache: &PlanCache) -> Result<()> {
        let _guard = self.build_lock.lock().unwrap();

        let pending: Vec<BuildFn> = {
            let mut registered = self.registered.lock().unwrap();
            registered.drain(..).collect()
        };

        if !pending.is_empty() {
            debug!("building {} entity configuration(s)", pending.len());
        }

        let mut pending = pending.into_iter();
        while let Some(build) = pending.next() {
            if let Err(err) = build(cache) {
                let mut registered = self.registered.lock().unwrap();
                let mut kept: Vec<BuildFn> = pending.collect();
                kept.append(&mut registered);
                *registered = kept;
                return Err(err);
            }
        }

        self.built.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// The process-wide "discovery has run" flag, consulted lazily by
    /// `bulk_insert`.
    pub fn is_built(&self) -> bool {
        self.built.load(Ordering::SeqCst)
    }
}

impl Default for Configurator {
    fn default() -> Self {
        Self::new()
    }
}
