// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::safe_transform;
use common::{EngineError, JobArgs, Result, TagMap};
use config::{BufferConfig, EngineConfig, GeneralConfig};
use jobqueue::{JobResult, StreamBuffer};
use queues::{MessageBus, MessageTag, Payload};
use std::collections::HashMap;
use std::thread;
use std::time::Duration;
use store::{Store, Transform, WriteIntent};

pub struct WorkerSummary {
    pub completed: usize,
}

/// The worker's main loop (§4.5.2): requests jobs, buffers transformed
/// streams, and participates in the collective phase whenever the master
/// forces one or the fleet drains.
#[allow(clippy::too_many_arguments)]
pub fn run(
    bus: &dyn MessageBus,
    input_store: &dyn Store,
    output_store: &dyn Store,
    transform: &dyn Transform,
    tag_map: &TagMap,
    config: &EngineConfig,
) -> Result<WorkerSummary> {
    let tick = Duration::from_millis(config.general().tick_interval_ms());
    let max_bytes = config.buffer().max_bytes();

    let mut buffer = StreamBuffer::new(config.buffer().size_safety_margin());
    let mut pending_intents: HashMap<(JobArgs, usize), WriteIntent> = HashMap::new();

    let mut waiting_for_item = false;
    let mut waiting_for_write = false;
    let mut poison_pill_received = false;
    let mut completed = 0usize;

    loop {
        if bus.probe(Some(0), Some(MessageTag::AllDone)) {
            bus.recv(0, MessageTag::AllDone)?;
            break;
        }

        if bus.probe(Some(0), Some(MessageTag::MasterForcesWrite)) {
            bus.recv(0, MessageTag::MasterForcesWrite)?;
            let contribution = build_intents(output_store, tag_map, &buffer, &mut pending_intents)?;
            crate::collective::gather_and_apply(bus, output_store, contribution, false)?;
            bus.barrier();

            for (args, stream) in buffer.drain() {
                for (idx, trace) in stream.traces.iter().enumerate() {
                    let intent = pending_intents.remove(&(args.clone(), idx)).ok_or_else(|| {
                        EngineError::BusProtocolViolation(format!(
                            "no write intent staged for {args} trace {idx}"
                        ))
                    })?;
                    output_store.write_independent(&intent, trace)?;
                }
                let result = JobResult::Written {
                    trace_count: stream.traces.len(),
                };
                bus.send(
                    Payload::Completion { args, result },
                    0,
                    MessageTag::WorkerDoneWithItem,
                    true,
                )?;
                completed += 1;
            }
            crate::metrics::STREAM_BUFFER_BYTES.set(0);
            waiting_for_write = false;
            continue;
        }

        if waiting_for_write || poison_pill_received {
            thread::sleep(tick);
            continue;
        }

        if !waiting_for_item {
            bus.send(Payload::Empty, 0, MessageTag::WorkerRequestsItem, true)?;
            waiting_for_item = true;
        }

        if bus.probe(Some(0), Some(MessageTag::MasterSendsItem)) {
            let payload = bus.recv(0, MessageTag::MasterSendsItem)?;
            waiting_for_item = false;
            match payload {
                Payload::EndOfQueue => {
                    if !buffer.is_empty() {
                        bus.send(Payload::Empty, 0, MessageTag::WorkerRequestsWrite, true)?;
                        waiting_for_write = true;
                    }
                    bus.send(Payload::Empty, 0, MessageTag::PoisonPillReceived, true)?;
                    poison_pill_received = true;
                }
                Payload::Item(args) => {
                    let (stream, station_xml) =
                        input_store.read_waveform_and_station(&args.station, &args.tag)?;
                    let transformed =
                        safe_transform::apply(transform, stream, station_xml.as_ref(), &args);
                    match transformed {
                        Some(stream) if !stream.is_empty() => {
                            buffer.insert(args, stream);
                            crate::metrics::STREAM_BUFFER_BYTES.set(buffer.size() as i64);
                            if buffer.size() >= max_bytes {
                                bus.send(Payload::Empty, 0, MessageTag::WorkerRequestsWrite, true)?;
                                waiting_for_write = true;
                            }
                        }
                        _ => {
                            bus.send(
                                Payload::Completion {
                                    args,
                                    result: JobResult::Dropped,
                                },
                                0,
                                MessageTag::WorkerDoneWithItem,
                                true,
                            )?;
                            completed += 1;
                        }
                    }
                }
                other => {
                    return Err(EngineError::BusProtocolViolation(format!(
                        "unexpected MasterSendsItem payload: {other:?}"
                    )));
                }
            }
        } else {
            thread::sleep(tick);
        }
    }

    bus.barrier();
    Ok(WorkerSummary { completed })
}

/// Builds one `WriteIntent` per trace currently buffered, stashing each
/// back into `pending_intents` keyed by (job, trace index) so the
/// independent-write flush can find it after the collective phase — the
/// explicit map the design notes substitute for annotating the trace
/// object directly.
fn build_intents(
    output_store: &dyn Store,
    tag_map: &TagMap,
    buffer: &StreamBuffer,
    pending_intents: &mut HashMap<(JobArgs, usize), WriteIntent>,
) -> Result<Vec<WriteIntent>> {
    let mut intents = Vec::new();
    for (args, stream) in buffer.iter() {
        let output_tag = tag_map.get(&args.tag).ok_or_else(|| {
            EngineError::BusProtocolViolation(format!(
                "{args}: buffered job has no tag-map entry"
            ))
        })?;
        for (idx, trace) in stream.traces.iter().enumerate() {
            let intent = output_store.describe_collective_write(output_tag, trace);
            pending_intents.insert((args.clone(), idx), intent.clone());
            intents.push(intent);
        }
    }
    Ok(intents)
}
