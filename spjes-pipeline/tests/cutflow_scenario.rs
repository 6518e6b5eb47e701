use approx::assert_relative_eq;
use spjes_core::{Cluster, Event, Particle};
use spjes_pipeline::{process_events, Accumulator, RESPONSE_SENTINEL};

fn clusters(n: usize) -> Vec<Cluster> {
    (0..n)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let e = 40_000.0 - 1_000.0 * i as f64;
            Cluster::from_raw(e, 0.0, 0.2, 0.1)
        })
        .collect()
}

fn particle(pdg_id: i32) -> Vec<Particle> {
    vec![Particle::new(40_000.0, 0.2, pdg_id)]
}

/// Ten events: 6 with a cluster and a particle, 4 of those led by a pion,
/// 3 of those with at least two clusters.
fn fixture() -> Vec<Event> {
    vec![
        Event::new(clusters(0), particle(211)),
        Event::new(clusters(0), vec![]),
        Event::new(clusters(2), vec![]),
        Event::new(clusters(1), vec![]),
        Event::new(clusters(3), particle(22)),
        Event::new(clusters(2), particle(2212)),
        Event::new(clusters(2), particle(211)),
        Event::new(clusters(3), particle(211)),
        Event::new(clusters(4), particle(211)),
        Event::new(clusters(1), particle(211)),
    ]
}

#[test]
fn test_ten_event_cutflow() {
    let acc = process_events(&fixture(), &Accumulator::new().unwrap()).unwrap();
    let counts: Vec<(u64, u64)> = acc.cutflow.iter().map(|c| (c.pass, c.all)).collect();

    assert_eq!(acc.events, 10);
    assert_eq!(counts, vec![(8, 10), (6, 8), (4, 6)]);
    assert_eq!(acc.cutflow.accepted(), 4);
}

#[test]
fn test_multiplicity_histograms_see_every_event() {
    let acc = process_events(&fixture(), &Accumulator::new().unwrap()).unwrap();
    let h = acc.book.n_clusters();

    assert_eq!(h.entries(), 10);
    let expected = [2.0, 2.0, 3.0, 2.0, 1.0];
    for (n, want) in expected.iter().enumerate() {
        assert_relative_eq!(h.bin_content(n + 1), *want);
    }
    assert_relative_eq!(h.integral(), 10.0);

    let p = acc.book.n_particles();
    assert_eq!(p.entries(), 10);
    assert_relative_eq!(p.bin_content(1), 3.0);
    assert_relative_eq!(p.bin_content(2), 7.0);
}

#[test]
fn test_final_view_histograms() {
    let acc = process_events(&fixture(), &Accumulator::new().unwrap()).unwrap();

    let pdg = acc.book.pdg_ids();
    assert_eq!(pdg.entries(), 4);
    assert_relative_eq!(pdg.bin_content(212), 4.0);

    let response = acc.book.inclusive_response();
    assert_eq!(response.entries(), 4);
    assert_relative_eq!(response.underflow(), 1.0);
    assert_relative_eq!(response.integral(), 3.0);

    let e = acc.book.leading_cluster_e();
    assert_eq!(e.entries(), 4);
    assert_relative_eq!(e.integral(), 4.0);
    assert_relative_eq!(e.mean().unwrap(), 40.0);

    assert_eq!(acc.book.response().entries(), 4);
}

#[test]
fn test_sentinel_only_for_single_cluster_pions() {
    for event in fixture() {
        let outcome = spjes_pipeline::evaluate(&event);
        if let Some(derived) = outcome.derived() {
            if event.n_clusters() < 2 {
                assert_eq!(derived.response, RESPONSE_SENTINEL);
            } else {
                assert!(derived.response > 0.0);
            }
            assert_eq!(event.particles[0].pdg_id, 211);
            assert_relative_eq!(derived.leading_cluster_e * 1000.0, event.clusters[0].raw_e);
        }
    }
}
