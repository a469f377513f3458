use std::process::ExitCode;
use std::thread;

use audio_cmd_ring::affinity;
use audio_cmd_ring::config::RingConfig;
use audio_cmd_ring::payload::{AudioCommand, CommandKind};
use audio_cmd_ring::runtime::{BatchLatency, QueueStats, RunTimer};
use audio_cmd_ring::{Consumer, Producer, RingQueue};

/// Commands the consumer takes per drain, i.e. per simulated audio callback.
const BATCH: usize = 64;

fn command_for(sequence: u64) -> AudioCommand {
    let voice = (sequence % 32) as u32;
    let frame = (sequence % 480) as u32;
    match sequence % 4 {
        0 => AudioCommand::new(sequence, voice, frame, CommandKind::Play, 0),
        1 => AudioCommand::set_volume(sequence, voice, frame, 0.5),
        2 => AudioCommand::new(sequence, voice, frame, CommandKind::SubmitBuffer, voice),
        _ => AudioCommand::new(sequence, voice, frame, CommandKind::Stop, 0),
    }
}

fn produce(mut producer: Producer<'_, AudioCommand>, cfg: &RingConfig, stats: &QueueStats) {
    affinity::pin_role("producer", cfg.producer_core);
    for sequence in 0..cfg.messages {
        let mut cmd = command_for(sequence);
        while let Err(err) = producer.enqueue(cmd) {
            stats.rejected.inc();
            cmd = err.into_inner();
            std::hint::spin_loop();
        }
        stats.enqueued.inc();
    }
    log::debug!("producer finished after {} commands", cfg.messages);
}

/// Drains until every command has arrived. Returns the number of sequence
/// gaps observed, which must be zero, and the per-batch drain timing.
fn consume(
    mut consumer: Consumer<'_, AudioCommand>,
    cfg: &RingConfig,
    stats: &QueueStats,
) -> (u64, BatchLatency) {
    affinity::pin_role("consumer", cfg.consumer_core);
    let mut batch: heapless::Vec<AudioCommand, BATCH> = heapless::Vec::new();
    let mut latency = BatchLatency::default();
    let mut expected = 0u64;
    let mut gaps = 0u64;

    while expected < cfg.messages {
        batch.clear();
        let started = minstant::Instant::now();
        let moved = consumer.drain_into(&mut batch);
        if moved == 0 {
            std::hint::spin_loop();
            continue;
        }
        latency.record(started, moved);
        for cmd in &batch {
            if cmd.sequence() != expected || cmd.kind().is_none() {
                gaps += 1;
            }
            expected = cmd.sequence() + 1;
        }
        stats.dequeued.add(batch.len() as u64);
    }
    (gaps, latency)
}

fn main() -> ExitCode {
    env_logger::init();

    let cfg = match RingConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            log::error!("invalid configuration: {err}");
            return ExitCode::from(2);
        }
    };

    let mut queue = match RingQueue::<AudioCommand>::with_capacity(cfg.capacity) {
        Ok(queue) => queue,
        Err(err) => {
            log::error!("cannot allocate ring: {err}");
            return ExitCode::from(2);
        }
    };

    log::info!(
        "Starting ring handoff: capacity={}, messages={}, batch={}",
        cfg.capacity,
        cfg.messages,
        BATCH
    );

    let stats = QueueStats::new();
    let timer = RunTimer::start();
    let (producer, consumer) = queue.split();

    let outcome = thread::scope(|s| {
        s.spawn(|| produce(producer, &cfg, &stats));
        let consumer = s.spawn(|| consume(consumer, &cfg, &stats));
        consumer.join()
    });
    let micros = timer.elapsed_micros();

    let (gaps, latency) = match outcome {
        Ok(outcome) => outcome,
        Err(_) => {
            log::error!("consumer thread panicked");
            return ExitCode::FAILURE;
        }
    };

    log::info!(
        "stats: enqueued={}, dequeued={}, rejected={}, elapsed={} us, {} cmds/s",
        stats.enqueued.get(),
        stats.dequeued.get(),
        stats.rejected.get(),
        micros,
        RunTimer::rate_per_sec(stats.dequeued.get(), micros)
    );
    log::info!(
        "drains: {} batches, mean {} cmds, mean {} ns, worst {} ns",
        latency.batches,
        latency.mean_batch(),
        latency.mean_nanos(),
        latency.worst_nanos
    );

    if gaps != 0 || stats.in_flight() != 0 || !queue.is_empty() {
        log::error!("handoff corrupted: {gaps} sequence gap(s), {} in flight", stats.in_flight());
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
