use crossmode_core::ambe::UNITS_PER_DMR_BURST;
use crossmode_core::dmr::{self, DataType};
use crossmode_core::dmr_embedded;
use crossmode_core::dmr_lc::LinkControl;
use crossmode_core::sync::{detect_dmr_sync, FrameMarker, YSF_SYNC};
use crossmode_core::ysf;
use crossmode_core::ysf_fich::{Fich, FrameIndicator, YsfDataType};
use crossmode_core::VoiceFrame;
use proptest::prelude::*;

fn flip(frame: &mut [u8], bit: usize) {
    frame[bit / 8] ^= 0x80 >> (bit % 8);
}

fn voice_burst(seq: u8) -> [u8; dmr::DMR_BURST_BYTES] {
    let lc = LinkControl::group(2345001, 91);
    let units = [VoiceFrame::silence(); UNITS_PER_DMR_BURST];
    dmr::build_voice_burst(&units, seq, 1, &dmr_embedded::encode(&lc)).unwrap()
}

#[test]
fn test_built_bursts_carry_their_sync() {
    let lc = LinkControl::group(2345001, 91);
    let header = dmr::build_lc_burst(&lc, DataType::VoiceLcHeader, 1).unwrap();
    let terminator = dmr::build_lc_burst(&lc, DataType::TerminatorWithLc, 1).unwrap();

    assert_eq!(detect_dmr_sync(&header, 0), Some(FrameMarker::DmrBsData));
    assert_eq!(detect_dmr_sync(&terminator, 0), Some(FrameMarker::DmrBsData));
    assert_eq!(detect_dmr_sync(&voice_burst(0), 0), Some(FrameMarker::DmrBsVoice));
}

#[test]
fn test_embedded_signalling_bursts_have_no_sync() {
    // Bursts B-F carry EMB and embedded LC where A carries sync
    for seq in 1..6 {
        assert_eq!(
            detect_dmr_sync(&voice_burst(seq), 2),
            None,
            "burst {} matched a sync pattern",
            seq
        );
    }
}

#[test]
fn test_dmr_sync_tolerates_bit_errors() {
    let mut burst = voice_burst(0);
    let start = FrameMarker::DmrBsVoice.start_bit();
    for i in [0, 11, 23, 47] {
        flip(&mut burst, start + i);
    }

    assert_eq!(FrameMarker::DmrBsVoice.distance(&burst), 4);
    assert_eq!(detect_dmr_sync(&burst, 5), Some(FrameMarker::DmrBsVoice));
    assert_eq!(detect_dmr_sync(&burst, 3), None);
}

#[test]
fn test_short_burst_never_matches() {
    let burst = voice_burst(0);
    assert_eq!(detect_dmr_sync(&burst[..10], 48), None);
}

#[test]
fn test_ysf_frames_start_with_sync() {
    let frame = ysf::build_lc_frame(FrameIndicator::Header, YsfDataType::VoiceData2, "M0ABC", "ALL").unwrap();
    assert_eq!(&frame[..YSF_SYNC.len()], &YSF_SYNC);
    assert!(FrameMarker::Ysf.matches(&frame, 0));

    let units = [VoiceFrame::silence(); 5];
    let mut frame = ysf::build_vd2_frame(3, "M0ABC", "ALL", &units).unwrap();
    assert!(FrameMarker::Ysf.matches(&frame, 0));

    // A damaged sync does not stop the FICH from decoding
    flip(&mut frame, 5);
    flip(&mut frame, 30);
    assert_eq!(FrameMarker::Ysf.distance(&frame), 2);
    let fich = Fich::decode(&frame).unwrap();
    assert_eq!(fich.fi, FrameIndicator::Communications);
    assert_eq!(fich.frame_number, 3);
}

proptest! {
    #[test]
    fn prop_voice_sync_survives_few_errors(
        errors in proptest::sample::subsequence((0..48usize).collect::<Vec<_>>(), 0..=4)
    ) {
        let mut burst = voice_burst(0);
        let start = FrameMarker::DmrBsVoice.start_bit();
        for bit in &errors {
            flip(&mut burst, start + bit);
        }
        prop_assert_eq!(FrameMarker::DmrBsVoice.distance(&burst), errors.len() as u32);
        prop_assert_eq!(detect_dmr_sync(&burst, 4), Some(FrameMarker::DmrBsVoice));
    }
}
