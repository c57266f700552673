//! Passes a greeting around the ring of workers.
//!
//! Run with e.g. `mpiexec -np 4 target/debug/examples/ring` after building
//! with `--features mpi`.

use crossbar::{Mode, Session, SessionConfig};

fn main() {
    let config = SessionConfig {
        mode: Mode::Live,
        ..SessionConfig::default()
    };
    let mut session = Session::initialize(config).expect("transport failed to start");

    let rank = session.self_rank();
    let size = session.world_size();
    if size == 1 {
        println!("example must be run with >1 processes, e.g. with mpiexec -np 2");
        return;
    }

    let next = (rank + 1) % size;
    let prev = (rank + size - 1) % size;
    let greeting = format!("hello from rank {}", rank);

    session.send(next, 1, false, greeting.as_bytes()).unwrap();
    let delivery = session.receive(prev, 1, true).unwrap().unwrap();

    for turn in 0..size {
        if rank == turn {
            println!(
                "rank {} received: {}",
                rank,
                String::from_utf8_lossy(&delivery.body)
            );
        }
        session.barrier().unwrap();
    }
}
