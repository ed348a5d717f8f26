use std::ptr;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use lazy_static::lazy_static;
use parking_lot::RwLock;

use crate::level::Level;

/// A named logging channel with its own verbosity threshold.
///
/// Components are declared as `static`s and registered once at startup with
/// [`register_component`]. The level may be changed at any time from any
/// thread; it is stored in an atomic and read with relaxed ordering, so a
/// change becomes visible to other threads on their next load without any
/// stronger happens-before guarantee. A statement racing with a level change
/// may still be filtered by the old level, which is acceptable for logging.
///
/// # Examples
///
/// ```
/// # use binary_log_packer::{Component, Level, register_component};
/// static NET: Component = Component::new("doc::net", Level::Basic);
///
/// register_component(&NET);
/// assert!(!NET.is_logging(Level::Detail));
///
/// NET.set_level(Level::Trace);
/// assert!(NET.is_logging(Level::Detail));
/// ```
#[derive(Debug)]
pub struct Component {
    name: &'static str,
    id: AtomicUsize,
    level: AtomicU8,
}

impl Component {
    pub const fn new(name: &'static str, level: Level) -> Self {
        Self {
            name,
            id: AtomicUsize::new(0),
            level: AtomicU8::new(level as u8),
        }
    }

    /// Creates a component filtering at [`Level::Basic`].
    pub const fn with_default_level(name: &'static str) -> Self {
        Self::new(name, Level::Basic)
    }

    /// Returns true when a statement at `requested` should be emitted.
    ///
    /// This is the cheap gate evaluated before any packing work.
    #[inline]
    pub fn is_logging(&self, requested: Level) -> bool {
        self.level() >= requested
    }

    #[inline]
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    /// Registry id, or 0 while the component has not been registered.
    pub fn id(&self) -> usize {
        self.id.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// The crate's own component. Silent unless raised by configuration.
pub static PACKER: Component = Component::new("log_packer", Level::None);

/// Ids start at 1; 0 marks an unregistered component.
static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

lazy_static! {
    /// Every registered component, in registration order.
    ///
    /// The crate component is always first.
    static ref COMPONENTS: RwLock<Vec<&'static Component>> = {
        PACKER.id.store(NEXT_ID.fetch_add(1, Ordering::Relaxed), Ordering::Relaxed);
        RwLock::new(vec![&PACKER])
    };
}

/// Registers a component and returns its id.
///
/// Registering the same component twice returns the id assigned the first
/// time. Registration is meant to happen during startup; lookups afterwards
/// only take the read lock.
pub fn register_component(component: &'static Component) -> usize {
    let mut components = COMPONENTS.write();
    if components.iter().any(|c| ptr::eq(*c, component)) {
        return component.id();
    }

    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    component.id.store(id, Ordering::Relaxed);
    components.push(component);

    tracing::debug!(component = component.name, id, level = %component.level(), "registered log component");
    id
}

/// Returns all registered components in registration order.
pub fn all_components() -> Vec<&'static Component> {
    COMPONENTS.read().clone()
}

/// Looks up a registered component by name.
///
/// When several components share a name the first registered one wins.
pub fn find_component(name: &str) -> Option<&'static Component> {
    COMPONENTS.read().iter().copied().find(|c| c.name == name)
}
