
//
// Film tiling
//

/// A rectangular region of the film, processed by exactly one worker.
#[derive(Clone, Debug)]
pub struct RenderChunk {
    pub id: usize,
    pub left: usize,
    pub top: usize,
    pub width: usize,
    pub height: usize,
}

pub struct ChunkCoords {
    /// Position within the chunk
    pub chunk_pos: [usize; 2],
    /// Position on the full film
    pub film_pos: [usize; 2],
}

impl RenderChunk {
    /// Iterates over pixel positions within the chunk, row by row
    pub fn iter_pixels<'a>(&'a self) -> impl Iterator<Item=ChunkCoords> + 'a {
        (0..self.height)
            .flat_map(move |y| (0..self.width)
                .map(move |x| ChunkCoords {
                    chunk_pos: [x, y],
                    film_pos: [self.left + x, self.top + y],
                }))
    }
}

/// Partitions a film into disjoint tiles of at most {tile_size} on a side.
/// Edge tiles clamp to the film, so every pixel lands in exactly one tile.
pub fn create_render_chunks(width: usize, height: usize, tile_size: usize) -> Vec<RenderChunk> {
    assert!(tile_size > 0, "tile size must be non-zero");
    let mut chunks = vec![];
    let mut id = 0;
    let mut top = 0;
    while top < height {
        let chunk_height = tile_size.min(height - top);
        let mut left = 0;
        while left < width {
            let chunk_width = tile_size.min(width - left);
            chunks.push(RenderChunk {
                id,
                left,
                top,
                width: chunk_width,
                height: chunk_height,
            });
            id += 1;
            left += chunk_width;
        }
        top += chunk_height;
    }
    chunks
}
