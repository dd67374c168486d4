use rstest::rstest;
use sabr::RepresentationHolder;
use sabr_stream::ChunkIndex;
use sabr_test_utils::fixtures;

const SEC: u64 = 1_000_000;

fn indices() -> Vec<ChunkIndex> {
    vec![
        fixtures::four_segment_index(),
        ChunkIndex::from_durations([5 * SEC, 4_800_000, 5_200_000, 10 * SEC, 1]),
        ChunkIndex::new(vec![0, 10 * SEC, 25 * SEC], vec![10 * SEC, 10 * SEC, 5 * SEC]).unwrap(),
        ChunkIndex::uniform(1, 3 * SEC),
    ]
}

#[test]
fn segment_number_is_monotonic_in_position() {
    for index in indices() {
        let end = index.end_time_us() + SEC;
        let mut last = 0;
        for position in (0..=end).step_by(250_000) {
            let n = index.segment_number_for(position);
            assert!(n >= last, "segment number went back at {position}");
            assert!(n <= index.last_available_segment_number().unwrap());
            last = n;
        }
    }
}

#[test]
fn segments_end_where_declared_and_never_overlap() {
    for index in indices() {
        let last = index.last_available_segment_number().unwrap();
        for n in 0..=last {
            let start = index.segment_start_time_us(n).unwrap();
            let duration = index.segment_duration_us(n).unwrap();
            let end = index.segment_end_time_us(n).unwrap();
            assert_eq!(end, start + duration);
            if n < last {
                assert!(index.segment_start_time_us(n + 1).unwrap() >= end);
            }
        }
        assert_eq!(index.segment_start_time_us(last + 1), None);
    }
}

#[rstest]
#[case(0, 0)]
#[case(29_999_999, 0)]
#[case(30 * SEC, 1)]
#[case(65 * SEC, 2)]
#[case(119 * SEC, 3)]
#[case(500 * SEC, 3)]
fn reference_index_lookup(#[case] position: u64, #[case] expected: u64) {
    assert_eq!(
        fixtures::four_segment_index().segment_number_for(position),
        expected
    );
}

#[test]
fn holder_without_index_reports_no_segments() {
    let mut holder = RepresentationHolder::new(fixtures::video_representation());
    assert_eq!(holder.segment_count(), 0);
    assert!(!holder.has_index());

    holder.set_index(fixtures::four_segment_index());
    assert_eq!(holder.segment_count(), 4);
    assert_eq!(holder.segment_start_time_us(2), Some(60 * SEC));
}
