use crate::priv_prelude::*;

mod simplex;

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn random_bytes(len: usize) -> Vec<u8> {
    let mut ret = vec![0u8; len];
    rand::thread_rng().fill(&mut ret[..]);
    ret
}
