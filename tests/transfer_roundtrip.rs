//! Integration tests for the transfer path: chunked reassembly must be
//! indistinguishable from a direct transfer.

use std::sync::atomic::AtomicBool;

use meshport::geom::GeometryDataset;
use meshport::sniff::FormatTag;
use meshport::transfer::{
    read_frame, send_dataset_with, ChannelTransport, FramedTransport, ReassemblyRegistry,
    TransferOutcome, Transport, WireMessage,
};
use meshport::util::NullSink;
use smallvec::smallvec;

/// A dataset with every channel populated and recognizable values.
fn rich_dataset(vertices: usize) -> GeometryDataset {
    let mut ds = GeometryDataset::allocate("scan.ply", FormatTag::Ply, vertices, 2, true, true);
    for i in 0..vertices * 3 {
        ds.positions[i] = i as f32 * 0.5;
        ds.normals.as_mut().unwrap()[i] = (i % 7) as f32;
        ds.colors.as_mut().unwrap()[i] = (i % 251) as u8;
    }
    ds.decoded_vertices = vertices;
    ds.faces.push(smallvec![0, 1, 2]);
    ds.faces.push(smallvec![2, 1, 0, 3]);
    ds.comments.push("synthetic".to_string());
    ds
}

fn assert_datasets_equal(a: &GeometryDataset, b: &GeometryDataset) {
    assert_eq!(a.vertex_count, b.vertex_count);
    assert_eq!(a.decoded_vertices, b.decoded_vertices);
    assert_eq!(a.positions, b.positions);
    assert_eq!(a.colors, b.colors);
    assert_eq!(a.normals, b.normals);
    assert_eq!(a.faces, b.faces);
    assert_eq!(a.comments, b.comments);
}

#[test]
fn test_chunked_equals_direct_at_fractional_chunk_boundary() {
    // 2.5 chunks worth of vertices: 10 per chunk, 25 total.
    let chunk_vertices = 10;
    let dataset = rich_dataset(25);
    let alive = AtomicBool::new(true);

    // Direct: generous ceiling takes everything in one message.
    let (mut direct_transport, direct_rx) = ChannelTransport::pair(usize::MAX);
    let outcome = send_dataset_with(
        dataset.clone(),
        &mut direct_transport,
        &alive,
        &NullSink,
        chunk_vertices,
    )
    .unwrap();
    assert_eq!(outcome, TransferOutcome::Direct);

    // Chunked: tight ceiling rejects the direct attempt.
    let (mut chunked_transport, chunked_rx) = ChannelTransport::pair(512);
    let outcome = send_dataset_with(
        dataset.clone(),
        &mut chunked_transport,
        &alive,
        &NullSink,
        chunk_vertices,
    )
    .unwrap();
    assert_eq!(outcome, TransferOutcome::Chunked { chunks: 3 });

    // Both streams reassemble through the consumer-side registry.
    let registry = ReassemblyRegistry::new();

    let direct_result = direct_rx
        .try_iter()
        .find_map(|m| registry.handle(m).unwrap())
        .expect("direct transfer yields a dataset");

    let chunked_result = chunked_rx
        .try_iter()
        .find_map(|m| registry.handle(m).unwrap())
        .expect("chunked transfer yields a dataset");

    // Bit-identical per component.
    assert_datasets_equal(&direct_result, &dataset);
    assert_datasets_equal(&chunked_result, &dataset);
    assert_datasets_equal(&chunked_result, &direct_result);
}

#[test]
fn test_out_of_order_and_duplicated_delivery() {
    let dataset = rich_dataset(25);
    let alive = AtomicBool::new(true);

    let (mut transport, rx) = ChannelTransport::pair(512);
    send_dataset_with(dataset.clone(), &mut transport, &alive, &NullSink, 10).unwrap();

    let mut messages: Vec<WireMessage> = rx.try_iter().collect();
    // start, c0, c1, c2, complete. Shuffle the chunks and duplicate one.
    let duplicate = messages[2].clone();
    messages.swap(1, 3);
    messages.insert(3, duplicate);

    let registry = ReassemblyRegistry::new();
    let mut finished = None;
    for message in messages {
        if let Some(done) = registry.handle(message).unwrap() {
            finished = Some(done);
        }
    }

    assert_datasets_equal(&finished.unwrap(), &dataset);
}

#[test]
fn test_dropped_complete_is_detectable() {
    let dataset = rich_dataset(25);
    let alive = AtomicBool::new(true);

    let (mut transport, rx) = ChannelTransport::pair(512);
    send_dataset_with(dataset, &mut transport, &alive, &NullSink, 10).unwrap();

    let registry = ReassemblyRegistry::new();
    for message in rx.try_iter() {
        // Swallow the complete message: the transport dropped it.
        if matches!(message, WireMessage::ChunkComplete { .. }) {
            continue;
        }
        assert!(registry.handle(message).unwrap().is_none());
    }

    // Nothing was emitted and the transfer is visibly still pending.
    assert_eq!(registry.in_flight(), 1);
}

#[test]
fn test_dropped_chunk_fails_loudly_at_complete() {
    let dataset = rich_dataset(25);
    let alive = AtomicBool::new(true);

    let (mut transport, rx) = ChannelTransport::pair(512);
    send_dataset_with(dataset, &mut transport, &alive, &NullSink, 10).unwrap();

    let registry = ReassemblyRegistry::new();
    let mut error = None;
    for message in rx.try_iter() {
        // Drop chunk 1 on the floor.
        if matches!(&message, WireMessage::Chunk(c) if c.chunk_index == 1) {
            continue;
        }
        match registry.handle(message) {
            Ok(_) => {}
            Err(e) => error = Some(e),
        }
    }

    let error = error.expect("incomplete stream must fail at complete");
    assert!(error.to_string().contains("missing"));
}

#[test]
fn test_framed_transport_across_byte_boundary() {
    // Simulate a real process boundary: frames serialized to bytes on
    // one side, parsed and reassembled on the other.
    let dataset = rich_dataset(25);
    let alive = AtomicBool::new(true);

    let mut transport = FramedTransport::new(Vec::new(), 512);
    let outcome =
        send_dataset_with(dataset.clone(), &mut transport, &alive, &NullSink, 10).unwrap();
    assert_eq!(outcome, TransferOutcome::Chunked { chunks: 3 });

    let bytes = transport.into_inner();
    let mut reader = bytes.as_slice();
    let registry = ReassemblyRegistry::new();
    let mut finished = None;
    while let Some(message) = read_frame(&mut reader).unwrap() {
        if let Some(done) = registry.handle(message).unwrap() {
            finished = Some(done);
        }
    }

    assert_datasets_equal(&finished.unwrap(), &dataset);
}

#[test]
fn test_cancellation_stops_chunk_stream() {
    let dataset = rich_dataset(25);

    // Liveness off from the start: nothing is sent, no error raised.
    let alive = AtomicBool::new(false);
    let (mut transport, rx) = ChannelTransport::pair(512);
    let outcome =
        send_dataset_with(dataset, &mut transport, &alive, &NullSink, 10).unwrap();
    assert_eq!(outcome, TransferOutcome::Cancelled);
    assert_eq!(rx.try_iter().count(), 0);
}

#[test]
fn test_zero_vertex_dataset_chunks_cleanly() {
    let dataset = GeometryDataset::allocate("empty.ply", FormatTag::Ply, 0, 0, false, false);
    let alive = AtomicBool::new(true);

    // Ceiling of zero rejects even the empty direct payload.
    struct AlwaysReject<T: Transport>(T);
    impl<T: Transport> Transport for AlwaysReject<T> {
        fn send(
            &mut self,
            message: WireMessage,
        ) -> std::result::Result<(), meshport::transfer::SendError> {
            if matches!(message, WireMessage::Direct(_)) {
                let size = message.payload_bytes();
                return Err(meshport::transfer::SendError::Rejected {
                    message,
                    size,
                    limit: 0,
                });
            }
            self.0.send(message)
        }
    }

    let (inner, rx) = ChannelTransport::pair(usize::MAX);
    let mut transport = AlwaysReject(inner);
    let outcome = send_dataset_with(dataset, &mut transport, &alive, &NullSink, 10).unwrap();
    assert_eq!(outcome, TransferOutcome::Chunked { chunks: 0 });

    let registry = ReassemblyRegistry::new();
    let finished = rx
        .try_iter()
        .find_map(|m| registry.handle(m).unwrap())
        .expect("empty dataset still completes");
    assert_eq!(finished.vertex_count, 0);
}
