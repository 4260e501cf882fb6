//! S4: end-to-end copy over loopback TCP, verified by content hash.

use std::io::Write;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use xdd_core::clock::Clock;
use xdd_core::config::{E2eAddress, E2eConfig, Role, TargetConfig};
use xdd_core::e2e::{DestinationSession, SourceSession};
use xdd_core::io_backend::StdIoBackend;
use xdd_core::plan::RunFlags;
use xdd_core::target::Target;

fn sha256_of(path: &std::path::Path) -> Vec<u8> {
    let bytes = std::fs::read(path).unwrap();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hasher.finalize().to_vec()
}

#[test]
fn e2e_copy_preserves_content() {
    let dir = tempfile::tempdir().unwrap();
    let src_path = dir.path().join("src");
    let dst_path = dir.path().join("dst");

    // 256 KiB of pseudo-random-looking content, cheap to generate
    // deterministically without a `rand` dependency (mirrors the
    // access-pattern planner's own seeded LCG approach).
    let mut src_file = std::fs::File::create(&src_path).unwrap();
    let mut state: u32 = 0x2545F491;
    let mut body = vec![0u8; 256 * 1024];
    for b in body.iter_mut() {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        *b = (state >> 16) as u8;
    }
    src_file.write_all(&body).unwrap();
    drop(src_file);

    let base_port = 50_300u16;
    let port_count = 2u16;
    let e2e = E2eConfig {
        addresses: vec![E2eAddress {
            host: "127.0.0.1".into(),
            base_port,
            port_count,
        }],
        network_ordering: Default::default(),
    };

    let clock = Arc::new(Clock::new());
    let flags = RunFlags::new();

    let mut dst_config = TargetConfig::new(1, dst_path.clone());
    dst_config.role = Role::E2eDestination;
    dst_config.rwratio = 1.0;
    dst_config.queue_depth = port_count as usize;
    dst_config.options.create = true;
    dst_config.e2e = Some(e2e.clone());
    let dst_target = Target::open(dst_config, Box::new(StdIoBackend), clock.clone()).unwrap();

    let dst_thread = std::thread::spawn({
        let flags = flags.clone();
        move || {
            let mut session = DestinationSession::listen("127.0.0.1", base_port, port_count).unwrap();
            dst_target.run_e2e_destination(&mut session, &flags).unwrap();
            dst_target
        }
    });

    // Give the destination a moment to bind before the source connects.
    std::thread::sleep(std::time::Duration::from_millis(50));

    let mut src_config = TargetConfig::new(0, src_path.clone());
    src_config.role = Role::E2eSource;
    src_config.rwratio = 0.0;
    src_config.request_size_blocks = 1;
    src_config.block_size = 32 * 1024;
    src_config.bytes = Some(body.len() as u64);
    src_config.queue_depth = port_count as usize;
    src_config.e2e = Some(e2e);
    let src_target = Target::open(src_config, Box::new(StdIoBackend), clock).unwrap();
    let session = SourceSession::connect(&[E2eAddress {
        host: "127.0.0.1".into(),
        base_port,
        port_count,
    }])
    .unwrap();
    src_target.run_e2e_source(&session, &flags).unwrap();

    dst_thread.join().unwrap();

    assert_eq!(sha256_of(&src_path), sha256_of(&dst_path));
}
