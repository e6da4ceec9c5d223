use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{ Duration, Instant };

use cancellation::{ CancellationToken, CancellationTokenSource };
use flume::{ Receiver, Sender };
use log::{ debug, info, warn };
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;

use lumen_impl::film::Film;
use lumen_impl::implementation::Scene;
use lumen_impl::integrator::{ cast_rays_into_scene, RenderSettings };
use lumen_impl::viewport::{ create_render_chunks, RenderChunk };

use crate::error::CliError;
use crate::options::Options;

/// Everything a worker needs to render a tile, shared read-only
struct RenderContext {
    scene: Arc<Scene>,
    settings: RenderSettings,
    film_width: usize,
    film_height: usize,
    rng_seed: u64,
}

/// A message from the master thread to a worker
struct RenderWork(RenderChunk, Arc<RenderContext>);

pub struct ChunkStats {
    pub degenerate_samples: u64,
    pub duration: Duration,
}

/// A message from a worker thread to the master thread
enum RenderThreadMessage {
    Ready(ThreadId),
    ChunkCompleted(ThreadId, RenderChunk, Film, ChunkStats),
    Terminated(ThreadId),
}

type ThreadId = u32;
type BoxError = Box<dyn std::error::Error + 'static>;

pub struct RenderReport {
    pub film: Film,
    pub degenerate_samples: u64,
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// Derives the per-pixel RNG seed from the global seed and the pixel
/// position, so the image is a deterministic function of the seed layout
/// no matter which worker renders which tile, in which order.
fn pixel_seed(global_seed: u64, x: usize, y: usize, film_width: usize) -> u64 {
    // splitmix64 finalizer over the pixel index
    let mut z = global_seed ^ ((y * film_width + x) as u64).wrapping_mul(0x9E3779B97F4A7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

fn start_render_thread(
    id: ThreadId,
    cancellation_token: &CancellationToken,
    work_receiver: &Receiver<RenderWork>,
    result_sender: &Sender<RenderThreadMessage>
) -> Result<(), BoxError> {
    use RenderThreadMessage::*;

    result_sender.send(Ready(id))?;

    // Receive tiles until the queue is drained
    for RenderWork(chunk, context) in work_receiver.into_iter() {
        // Cancellation is tile-granular: in-flight tiles always finish
        if cancellation_token.is_canceled() {
            return Ok(());
        }

        let time = Instant::now();
        let mut tile = Film::new(chunk.width, chunk.height);
        let mut degenerate_samples = 0;

        for p in chunk.iter_pixels() {
            let seed = pixel_seed(context.rng_seed, p.film_pos[0], p.film_pos[1], context.film_width);
            let mut rng = XorShiftRng::seed_from_u64(seed);
            let sample = cast_rays_into_scene(
                &context.settings,
                &context.scene,
                context.film_width,
                context.film_height,
                p.film_pos[0],
                p.film_pos[1],
                &mut rng);
            degenerate_samples += sample.degenerate_samples as u64;
            tile.add_samples(p.chunk_pos[0], p.chunk_pos[1], sample.radiance, sample.samples);
        }

        let stats = ChunkStats { degenerate_samples, duration: time.elapsed() };
        result_sender.send(ChunkCompleted(id, chunk, tile, stats))?;
    }

    Ok(())
}

fn start_background_render_threads(
    worker_count: usize,
    cts: &CancellationTokenSource,
    work_receiver: Receiver<RenderWork>,
    result_sender: Sender<RenderThreadMessage>
) -> Vec<JoinHandle<()>> {
    (0..worker_count as ThreadId)
        .map(|id| {
            let cancellation_token = cts.token().clone();
            let work_receiver = work_receiver.clone();
            let result_sender = result_sender.clone();
            let work = move || {
                if let Err(err) = start_render_thread(id, &cancellation_token, &work_receiver, &result_sender) {
                    warn!("render thread {id} terminated due to error: {err}");
                }
                // Notify master thread that we've terminated.
                // NOTE: There may be nobody listening...
                result_sender.send(RenderThreadMessage::Terminated(id)).ok();
            };
            std::thread::Builder::new()
                .name(format!("render-worker-{id}"))
                .spawn(work)
                .expect("failed to spawn render thread")
        })
        .collect()
}

/// Renders the scene across a pool of worker threads, one tile per worker
/// at a time, blitting completed tiles into the master film.
///
/// On cancellation the remaining queue is abandoned and the film is returned
/// partially populated with whatever tiles completed.
pub fn run_render_job(
    scene: Arc<Scene>,
    options: &Options,
    cts: &CancellationTokenSource
) -> Result<RenderReport, CliError> {
    use RenderThreadMessage::*;

    let start_time = Instant::now();
    let width = options.output_width;
    let height = options.output_height;
    let worker_count = options.resolved_worker_count();
    let chunks = create_render_chunks(width, height, options.tile_size);
    let total_chunks = chunks.len();

    info!(
        "rendering {}x{} at {} spp: {} tiles across {} workers",
        width, height, options.samples_per_pixel, total_chunks, worker_count);

    let context = Arc::new(RenderContext {
        scene,
        settings: options.render_settings(),
        film_width: width,
        film_height: height,
        rng_seed: options.rng_seed,
    });

    let (work_sender, work_receiver) = flume::unbounded::<RenderWork>();
    let (result_sender, result_receiver) = flume::unbounded::<RenderThreadMessage>();

    for chunk in chunks {
        work_sender.send(RenderWork(chunk, context.clone())).expect("work queue rejected a tile");
    }
    // Workers exit once the queue is drained
    drop(work_sender);

    let thread_handles = start_background_render_threads(worker_count, cts, work_receiver, result_sender);

    let mut film = Film::new(width, height);
    let mut completed_chunks = 0;
    let mut degenerate_samples = 0;
    let mut terminated_workers = 0;

    for message in result_receiver.iter() {
        match message {
            Ready(_) => {}
            ChunkCompleted(id, chunk, tile, stats) => {
                film.blit_chunk(&chunk, &tile);
                completed_chunks += 1;
                degenerate_samples += stats.degenerate_samples;
                debug!(
                    "tile {} done on worker {id} in {:.1}ms ({completed_chunks}/{total_chunks})",
                    chunk.id, stats.duration.as_secs_f64() * 1000.0);
                if completed_chunks == total_chunks {
                    break;
                }
            }
            Terminated(_) => {
                terminated_workers += 1;
                if terminated_workers == thread_handles.len() {
                    // Nothing left to produce results
                    break;
                }
            }
        }
    }

    for handle in thread_handles {
        handle.join().ok();
    }

    let cancelled = cts.token().is_canceled();
    if completed_chunks < total_chunks && !cancelled {
        return Err(CliError::WorkersDied);
    }

    let elapsed = start_time.elapsed();
    info!(
        "render {} in {:.2}s ({completed_chunks}/{total_chunks} tiles, {degenerate_samples} degenerate samples)",
        if cancelled { "cancelled" } else { "complete" },
        elapsed.as_secs_f64());

    Ok(RenderReport {
        film,
        degenerate_samples,
        cancelled,
        elapsed,
    })
}
