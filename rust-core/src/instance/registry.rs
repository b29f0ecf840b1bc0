//! Process-wide set of instances, created on first reference by name

use std::sync::{Arc, Once};

use parking_lot::RwLock;

use crate::channel::{parse_link, Channel};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::scheduler::JobScheduler;

use super::Instance;

static BANNER: Once = Once::new();

/// Owns the instances and the worker pool their cycles run on
pub struct InstanceRegistry {
    // Insertion order is kept for reports
    instances: RwLock<Vec<Arc<Instance>>>,
    config: EngineConfig,
    scheduler: JobScheduler,
}

impl InstanceRegistry {
    /// Start the worker pool described by `config`
    pub fn new(config: EngineConfig) -> Result<Self> {
        BANNER.call_once(|| {
            log::info!("FFT instance core {} (realfft backend)", crate::VERSION);
        });

        let scheduler = JobScheduler::from_config(&config)?;
        Ok(Self {
            instances: RwLock::new(Vec::new()),
            config,
            scheduler,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    pub fn find(&self, name: &str) -> Option<Arc<Instance>> {
        self.instances
            .read()
            .iter()
            .find(|i| i.name() == name)
            .cloned()
    }

    /// Look up `name`, creating the instance if it does not exist yet
    pub fn find_or_create(&self, name: &str) -> Arc<Instance> {
        if let Some(instance) = self.find(name) {
            return instance;
        }

        let mut instances = self.instances.write();
        // Another thread may have created it between the two locks
        if let Some(instance) = instances.iter().find(|i| i.name() == name) {
            return Arc::clone(instance);
        }

        log::debug!("Creating FFT instance '{}'", name);
        let instance = Instance::new(name, &self.scheduler, &self.config);
        instances.push(Arc::clone(&instance));
        instance
    }

    pub fn instances(&self) -> Vec<Arc<Instance>> {
        self.instances.read().clone()
    }

    /// Bind a new channel to the instance named in `link`
    ///
    /// # Errors
    /// Any link grammar error; no instance is created in that case
    pub fn connect(&self, channel_name: &str, link: &str) -> Result<Arc<Channel>> {
        let spec = parse_link(link)?;
        let instance = self.find_or_create(&spec.instance);

        let channel = Arc::new(Channel::new(
            channel_name,
            spec.role,
            spec.offset,
            Arc::downgrade(&instance),
        ));
        instance.attach(Arc::clone(&channel), spec.trigger);
        Ok(channel)
    }

    /// Reports of all instances, in creation order
    pub fn report(&self) -> String {
        self.instances()
            .iter()
            .map(|i| i.report().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
