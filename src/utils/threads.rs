use std::thread;

/// Spawns a thread carrying a descriptive name, so that supervised work shows
/// up identifiably in thread dumps.
pub fn spawn_named<F, T>(name: impl Into<String>, f: F) -> thread::JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .spawn(f)
        .expect("thread name should be valid")
}
