//! Fuzz target: `PersistedState::decode`
//!
//! Feeds arbitrary bytes as a stored restart snapshot.  Flash can hold
//! anything after a power cut or a firmware downgrade, so decoding must
//! never panic and anything it accepts must survive a save/load cycle.
//!
//! cargo fuzz run fuzz_state_decode

#![no_main]

use homealarm::alarm::state::PersistedState;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Some(state) = PersistedState::decode(data) {
        let bytes = postcard_bytes(&state);
        assert_eq!(PersistedState::decode(&bytes), Some(state));
    }
});

fn postcard_bytes(state: &PersistedState) -> Vec<u8> {
    let mut store = MemStore::default();
    state.save(&mut store).expect("in-memory save");
    store.0
}

#[derive(Default)]
struct MemStore(Vec<u8>);

impl homealarm::app::ports::StoragePort for MemStore {
    fn read(
        &self,
        _namespace: &str,
        _key: &str,
        buf: &mut [u8],
    ) -> Result<usize, homealarm::app::ports::StorageError> {
        let n = self.0.len().min(buf.len());
        buf[..n].copy_from_slice(&self.0[..n]);
        Ok(n)
    }

    fn write(
        &mut self,
        _namespace: &str,
        _key: &str,
        data: &[u8],
    ) -> Result<(), homealarm::app::ports::StorageError> {
        self.0 = data.to_vec();
        Ok(())
    }

    fn delete(
        &mut self,
        _namespace: &str,
        _key: &str,
    ) -> Result<(), homealarm::app::ports::StorageError> {
        self.0.clear();
        Ok(())
    }

    fn exists(&self, _namespace: &str, _key: &str) -> bool {
        !self.0.is_empty()
    }
}
