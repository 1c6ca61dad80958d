use rand::RngCore;
#[cfg(test)] use std::sync::Mutex;


#[cfg(test)]
/// automock expectations for static methods are global - hold this lock to avoid races
pub static MOCK_RANDOM_MUTEX: Mutex<()> = Mutex::new(());

/// Source of entropy for node ids. It is passed around as a type parameter so that code
///  generating ids can be run against a deterministic implementation in tests.
#[cfg_attr(test, mockall::automock)]
pub trait Random {
    fn next_u64() -> u64;
}

/// Default entropy source, backed by the thread local RNG.
///
/// NB: `thread_rng` panics if the OS entropy source fails while seeding. That is fatal at
///      socket creation, there is no meaningful way to continue without a node id.
pub struct RngRandom {}
impl Random for RngRandom {
    fn next_u64() -> u64 {
        rand::thread_rng().next_u64()
    }
}
