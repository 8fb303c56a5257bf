use std::time::Instant;

use crate::simulation::barnes_hut::NBodyForce;
use crate::simulation::engine::Simulation;
use crate::simulation::error::SimResult;
use crate::simulation::forces::DirectNBodyForce;
use crate::simulation::params::Parameters;

/// Compare one force evaluation: direct pairwise vs Barnes–Hut
pub fn bench_nbody() {
    // Different system sizes to test
    let ns = [200, 400, 800, 1600, 3200, 6400];

    for n in ns {
        let bh = NBodyForce::new(-5.0).with_distance_range(2.0, 0.0);
        let direct = DirectNBodyForce::from(&bh);

        let mut sim_direct = make_simulation(n);
        sim_direct.add_force(direct);

        let mut sim_bh = make_simulation(n);
        sim_bh.add_force(bh);

        // Warm up
        sim_direct.eval();
        sim_bh.eval();

        // Time direct
        let t0 = Instant::now();
        sim_direct.eval();
        let dt_direct = t0.elapsed().as_secs_f64();

        // Time barnes-hut
        let t1 = Instant::now();
        sim_bh.eval();
        let dt_bh = t1.elapsed().as_secs_f64();

        println!("N = {n:5}, direct = {:8.6} s, BH = {:8.6} s", dt_direct, dt_bh);
    }
}

/// Time full layout ticks (gravity, n-body, drag, springs) on a ring graph
pub fn bench_tick() -> SimResult<()> {
    let ns = [200, 400, 800, 1600, 3200, 6400, 12800];
    let steps = 10;

    for n in ns {
        let mut sim = make_ring_layout(n)?;

        // Warm-up fills the node pool
        sim.tick(1.0);

        let t0 = Instant::now();
        for _ in 0..steps {
            sim.tick(1.0);
        }
        let per_tick = t0.elapsed().as_secs_f64() / steps as f64;

        println!("N = {:5}, layout tick = {:8.6} s", n, per_tick);
    }
    Ok(())
}

/// Layout tick cost over a range of n, as CSV
/// Paste output directly into a spreadsheet to graph
pub fn bench_tick_curve() -> SimResult<()> {
    println!("N,tick_ms");

    for n in (200..=12800).step_by(200) {
        // Small n: average over a few ticks to smooth noise
        let steps = if n <= 2000 { 5 } else { 1 };
        let mut sim = make_ring_layout(n)?;
        sim.tick(1.0);

        let t0 = Instant::now();
        for _ in 0..steps {
            sim.tick(1.0);
        }
        let ms = t0.elapsed().as_secs_f64() * 1000.0 / steps as f64;

        println!("{},{:.6}", n, ms);
    }
    Ok(())
}

/// `n` active unit-mass particles with no forces, deterministic positions
fn make_simulation(n: usize) -> Simulation {
    let mut sim = Simulation::new(Parameters::default());
    for i in 0..n {
        let i_f = i as f64;
        let id = sim.add_particle(1.0, (i_f * 0.37).sin() * 500.0, (i_f * 0.13).cos() * 500.0);
        if let Some(p) = sim.particle_mut(id) {
            p.is_active = true;
        }
    }
    sim
}

/// Default layout stack over a ring of `n` particles joined by springs
fn make_ring_layout(n: usize) -> SimResult<Simulation> {
    let mut sim = Simulation::layout(Parameters::default());
    let radius = n as f64;
    let ids: Vec<_> = (0..n)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / n as f64;
            let id = sim.add_particle(1.0, radius * angle.cos(), radius * angle.sin());
            if let Some(p) = sim.particle_mut(id) {
                p.is_active = true;
            }
            id
        })
        .collect();

    for i in 0..n {
        sim.add_spring(ids[i], ids[(i + 1) % n], 30.0, 0.1, 0.1)?;
    }
    Ok(sim)
}
