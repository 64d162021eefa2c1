use rstest::rstest;
use std::time::Duration;
use teleop_hardware::error::HwError;
use teleop_hardware::{GloveSim, SimulatedGlove};
use teleop_traits::{ChannelId, Glove};

fn quiet() -> GloveSim {
    GloveSim {
        noise: 0.0,
        glitch_probability: 0.0,
        ..GloveSim::default()
    }
}

#[rstest]
#[case(ChannelId::Position(3), "position")]
#[case(ChannelId::Position(usize::MAX), "position")]
#[case(ChannelId::Finger(7), "finger")]
fn bad_channel_ids_name_their_kind(#[case] id: ChannelId, #[case] kind: &str) {
    let g = SimulatedGlove::new(quiet());
    let err = g.read_channel(id).expect_err("out of range");
    match err.downcast_ref::<HwError>() {
        Some(HwError::ChannelOutOfRange { kind: k, .. }) => assert_eq!(*k, kind),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn timed_disconnect_sets_fault_flag() {
    let g = SimulatedGlove::new(GloveSim {
        disconnect_after: Some(Duration::ZERO),
        ..quiet()
    });
    assert!(g.is_faulted());
    assert!(g.read_channel(ChannelId::Position(0)).is_err());
}

#[test]
fn button_a_tap_is_scripted() {
    let g = SimulatedGlove::new(GloveSim {
        tap_a_at: Some(Duration::ZERO),
        ..quiet()
    });
    assert!(g.read_button(0).expect("read"));
    assert!(!g.read_button(1).expect("read"));
    std::thread::sleep(Duration::from_millis(200));
    assert!(!g.read_button(0).expect("read"));
}

#[test]
fn noise_is_bounded() {
    let g = SimulatedGlove::new(GloveSim {
        noise: 0.5,
        glitch_probability: 0.0,
        amplitude: [0.0; 3],
        ..GloveSim::default()
    });
    for _ in 0..500 {
        let v = g.read_channel(ChannelId::Position(1)).expect("read");
        assert!((v - 22.5).abs() <= 0.5, "{v}");
    }
}
