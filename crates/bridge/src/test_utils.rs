//! Test utilities for the bridge
//!
//! Recording outlets keep every pushed sample in a shared log so tests can
//! inspect what would have been published.
//!
//! # Example
//!
//! ```
//! use bridge::outlet::StreamOutlet;
//! use bridge::test_utils::RecordingOutlet;
//!
//! let mut outlet = RecordingOutlet::new();
//! let samples = outlet.samples();
//! outlet.push_sample(&vec![1.0, 2.0]).unwrap();
//! assert_eq!(samples.borrow().len(), 1);
//! ```

use crate::descriptor::StreamDescriptor;
use crate::error::OutletError;
use crate::outlet::{OutletFactory, StreamOutlet};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared log of pushed samples
pub type SampleLog = Rc<RefCell<Vec<Vec<f32>>>>;

/// Hook run when an outlet is dropped
pub type DropHook = Rc<dyn Fn()>;

/// Outlet that records every pushed sample
pub struct RecordingOutlet {
    samples: SampleLog,
    push_limit: Option<usize>,
    on_drop: Option<DropHook>,
}

impl RecordingOutlet {
    pub fn new() -> Self {
        Self {
            samples: Rc::new(RefCell::new(Vec::new())),
            push_limit: None,
            on_drop: None,
        }
    }

    /// Accept `limit` samples, then fail every push
    pub fn failing_after(limit: usize) -> Self {
        Self {
            samples: Rc::new(RefCell::new(Vec::new())),
            push_limit: Some(limit),
            on_drop: None,
        }
    }

    pub fn samples(&self) -> SampleLog {
        Rc::clone(&self.samples)
    }
}

impl Default for RecordingOutlet {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamOutlet for RecordingOutlet {
    fn push_sample(&mut self, sample: &Vec<f32>) -> Result<(), OutletError> {
        let mut samples = self.samples.borrow_mut();
        if self.push_limit.is_some_and(|limit| samples.len() >= limit) {
            return Err(OutletError::Push("outlet closed".to_string()));
        }
        samples.push(sample.clone());
        Ok(())
    }
}

impl Drop for RecordingOutlet {
    fn drop(&mut self) {
        if let Some(hook) = &self.on_drop {
            hook();
        }
    }
}

/// Factory producing [`RecordingOutlet`]s that share one sample log
#[derive(Default)]
pub struct RecordingOutletFactory {
    samples: SampleLog,
    descriptors: Rc<RefCell<Vec<StreamDescriptor>>>,
    push_limit: Option<usize>,
    create_error: Option<String>,
    on_drop: Option<DropHook>,
}

impl RecordingOutletFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse to create outlets
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            create_error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Outlets accept `limit` samples, then fail
    pub fn with_push_limit(mut self, limit: usize) -> Self {
        self.push_limit = Some(limit);
        self
    }

    /// Run `hook` when a created outlet is dropped
    pub fn on_outlet_drop(mut self, hook: impl Fn() + 'static) -> Self {
        self.on_drop = Some(Rc::new(hook));
        self
    }

    pub fn samples(&self) -> SampleLog {
        Rc::clone(&self.samples)
    }

    /// Every descriptor an outlet was requested for
    pub fn descriptors(&self) -> Vec<StreamDescriptor> {
        self.descriptors.borrow().clone()
    }
}

impl OutletFactory for RecordingOutletFactory {
    fn create(
        &mut self,
        descriptor: &StreamDescriptor,
    ) -> Result<Box<dyn StreamOutlet>, OutletError> {
        self.descriptors.borrow_mut().push(descriptor.clone());
        if let Some(message) = &self.create_error {
            return Err(OutletError::Create(message.clone()));
        }
        Ok(Box::new(RecordingOutlet {
            samples: Rc::clone(&self.samples),
            push_limit: self.push_limit,
            on_drop: self.on_drop.clone(),
        }))
    }
}
