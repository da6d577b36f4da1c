//! Per-frame cluster cache and packing into the shared item list.

use std::mem::size_of;

use crate::core::records::{ClusterInfo, ClusterRecord};
use crate::error::{ClusterError, Result};
use crate::gpu::{BufferBinding, ClusterBufferSink};

/// Light indices gathered for one cluster during assignment.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CellLights {
    pub points: Vec<u32>,
    pub spots: Vec<u32>,
}

impl CellLights {
    pub fn len(&self) -> usize {
        self.points.len() + self.spots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.spots.is_empty()
    }

    fn clear(&mut self) {
        self.points.clear();
        self.spots.clear();
    }
}

/// Per-cluster scratch lists, cleared (not reallocated) every frame.
#[derive(Debug, Default, Clone)]
pub struct ClusterCache {
    cells: Vec<CellLights>,
}

impl ClusterCache {
    pub fn resize(&mut self, cluster_count: usize) {
        self.cells.resize_with(cluster_count, CellLights::default);
    }

    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }

    #[inline]
    pub fn push_point(&mut self, cluster: usize, light: u32) {
        self.cells[cluster].points.push(light);
    }

    #[inline]
    pub fn push_spot(&mut self, cluster: usize, light: u32) {
        self.cells[cluster].spots.push(light);
    }

    pub fn cells(&self) -> &[CellLights] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn total_items(&self) -> usize {
        self.cells.iter().map(CellLights::len).sum()
    }
}

/// Grow-only item list sized `avg_items_per_cluster * cluster_count`.
#[derive(Debug, Clone, Default)]
pub struct ItemBuffer {
    avg_items_per_cluster: u32,
    items: Vec<u32>,
}

impl ItemBuffer {
    /// Allocates `avg * cluster_count` slots, failing if the byte size exceeds `limit`.
    pub fn reset(
        &mut self,
        avg_items_per_cluster: u32,
        cluster_count: usize,
        limit: usize,
    ) -> Result<()> {
        let avg = avg_items_per_cluster.max(1);
        let capacity = checked_capacity(avg, cluster_count, limit)?;
        self.avg_items_per_cluster = avg;
        self.items.clear();
        self.items.resize(capacity, 0);
        Ok(())
    }

    /// Doubles the per-cluster average until `required` items fit.
    ///
    /// Returns `true` when the buffer grew. The size is checked against
    /// `limit` before anything is reallocated.
    pub fn ensure_capacity(
        &mut self,
        required: usize,
        cluster_count: usize,
        limit: usize,
    ) -> Result<bool> {
        if required <= self.items.len() {
            return Ok(false);
        }

        let mut avg = self.avg_items_per_cluster.max(1);
        while (avg as usize).saturating_mul(cluster_count) < required {
            avg = avg.checked_mul(2).ok_or(ClusterError::BufferTooLarge {
                buffer: BufferBinding::ItemList.label(),
                requested: usize::MAX,
                limit,
            })?;
        }
        let capacity = checked_capacity(avg, cluster_count, limit)?;

        log::info!(
            "Item list grows from {} to {} entries ({} per cluster)",
            self.items.len(),
            capacity,
            avg
        );
        self.avg_items_per_cluster = avg;
        self.items.resize(capacity, 0);
        Ok(true)
    }

    pub fn avg_items_per_cluster(&self) -> u32 {
        self.avg_items_per_cluster
    }

    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.items
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u32] {
        &mut self.items
    }
}

fn checked_capacity(avg: u32, cluster_count: usize, limit: usize) -> Result<usize> {
    let capacity = (avg as usize).saturating_mul(cluster_count);
    let bytes = capacity.saturating_mul(size_of::<u32>());
    if bytes > limit {
        return Err(ClusterError::BufferTooLarge {
            buffer: BufferBinding::ItemList.label(),
            requested: bytes,
            limit,
        });
    }
    Ok(capacity)
}

/// Writes one record per cluster and copies the cached indices behind each
/// other, point lights before spot lights. Returns the number of items written.
pub fn pack_clusters(
    cache: &ClusterCache,
    items: &mut [u32],
    records: &mut Vec<ClusterRecord>,
) -> Result<usize> {
    records.clear();
    let mut offset = 0usize;
    for (cluster, cell) in cache.cells().iter().enumerate() {
        let point_count =
            u16::try_from(cell.points.len()).map_err(|_| ClusterError::ClusterOverflow {
                cluster,
                count: cell.points.len(),
            })?;
        let spot_count = u16::try_from(cell.spots.len()).map_err(|_| ClusterError::ClusterOverflow {
            cluster,
            count: cell.spots.len(),
        })?;

        let end = offset + cell.len();
        if end > items.len() {
            return Err(ClusterError::BufferTooLarge {
                buffer: BufferBinding::ItemList.label(),
                requested: end * size_of::<u32>(),
                limit: items.len() * size_of::<u32>(),
            });
        }

        records.push(ClusterRecord {
            offset: offset as u32,
            point_count,
            spot_count,
        });
        let spots_at = offset + cell.points.len();
        items[offset..spots_at].copy_from_slice(&cell.points);
        items[spots_at..end].copy_from_slice(&cell.spots);
        offset = end;
    }
    Ok(offset)
}

/// Packed output of the CPU clusterers and its upload to a sink.
pub struct PackedClusters {
    cache: ClusterCache,
    items: ItemBuffer,
    cluster_list: Vec<ClusterRecord>,
    item_count: usize,
    sink: Box<dyn ClusterBufferSink>,
}

impl PackedClusters {
    pub fn new(sink: Box<dyn ClusterBufferSink>) -> Self {
        Self {
            cache: ClusterCache::default(),
            items: ItemBuffer::default(),
            cluster_list: Vec::new(),
            item_count: 0,
            sink,
        }
    }

    pub fn max_storage_block_size(&self) -> usize {
        self.sink.max_storage_block_size()
    }

    /// Resizes every buffer for a freshly built grid and reallocates them on the sink.
    pub fn rebuild(
        &mut self,
        info: &mut ClusterInfo,
        avg_items_per_cluster: u32,
        cluster_count: usize,
    ) -> Result<()> {
        let limit = self.sink.max_storage_block_size();
        let list_bytes = cluster_count * size_of::<ClusterRecord>();
        if list_bytes > limit {
            return Err(ClusterError::BufferTooLarge {
                buffer: BufferBinding::ClusterList.label(),
                requested: list_bytes,
                limit,
            });
        }
        self.items.reset(avg_items_per_cluster, cluster_count, limit)?;
        self.cache.resize(cluster_count);
        self.cluster_list.clear();
        self.cluster_list.resize(cluster_count, ClusterRecord::default());
        self.item_count = 0;

        info.item_list_count = self.items.capacity() as u32;
        info.cluster_list_count = cluster_count as u32;

        log::debug!(
            "Allocating cluster buffers on {}: {} clusters, {} item slots",
            self.sink.name(),
            cluster_count,
            self.items.capacity()
        );
        self.sink.allocate(BufferBinding::ClusterInfo, bytemuck::bytes_of(info))?;
        self.sink
            .allocate(BufferBinding::ClusterList, bytemuck::cast_slice(&self.cluster_list))?;
        self.sink
            .allocate(BufferBinding::ItemList, bytemuck::cast_slice(self.items.as_slice()))?;
        Ok(())
    }

    pub fn begin_frame(&mut self) {
        self.cache.clear();
    }

    pub fn cache_mut(&mut self) -> &mut ClusterCache {
        &mut self.cache
    }

    pub fn cache(&self) -> &ClusterCache {
        &self.cache
    }

    /// Grows the item list if needed, packs the cache and uploads the live ranges.
    ///
    /// Growth reallocates the item list and re-uploads the info record with
    /// the new item count; steady-state frames only upload the used bytes.
    pub fn pack_and_upload(&mut self, info: &mut ClusterInfo) -> Result<()> {
        let limit = self.sink.max_storage_block_size();
        let required = self.cache.total_items();
        let cluster_count = self.cache.len();
        let grown = self.items.ensure_capacity(required, cluster_count, limit)?;

        self.item_count =
            pack_clusters(&self.cache, self.items.as_mut_slice(), &mut self.cluster_list)?;

        if grown {
            info.item_list_count = self.items.capacity() as u32;
            self.sink
                .allocate(BufferBinding::ItemList, bytemuck::cast_slice(self.items.as_slice()))?;
            self.sink.update(BufferBinding::ClusterInfo, bytemuck::bytes_of(info))?;
        } else {
            self.sink.update(
                BufferBinding::ItemList,
                bytemuck::cast_slice(&self.items.as_slice()[..self.item_count]),
            )?;
        }
        self.sink
            .update(BufferBinding::ClusterList, bytemuck::cast_slice(&self.cluster_list))?;

        self.sink.bind(BufferBinding::ClusterInfo)?;
        self.sink.bind(BufferBinding::ClusterList)?;
        self.sink.bind(BufferBinding::ItemList)?;
        Ok(())
    }

    pub fn cluster_list(&self) -> &[ClusterRecord] {
        &self.cluster_list
    }

    /// Live portion of the item list.
    pub fn items(&self) -> &[u32] {
        &self.items.as_slice()[..self.item_count]
    }

    pub fn item_capacity(&self) -> usize {
        self.items.capacity()
    }

    pub fn avg_items_per_cluster(&self) -> u32 {
        self.items.avg_items_per_cluster()
    }

    pub fn sink(&self) -> &dyn ClusterBufferSink {
        self.sink.as_ref()
    }

    /// Frees buffers replaced by growth in earlier frames; call after the
    /// fence of the last frame that read them.
    pub fn release_retired(&self) -> Result<()> {
        self.sink.release_retired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with(cells: &[(&[u32], &[u32])]) -> ClusterCache {
        let mut cache = ClusterCache::default();
        cache.resize(cells.len());
        for (i, (points, spots)) in cells.iter().enumerate() {
            for &p in *points {
                cache.push_point(i, p);
            }
            for &s in *spots {
                cache.push_spot(i, s);
            }
        }
        cache
    }

    #[test]
    fn pack_writes_running_offsets() {
        let cache = cache_with(&[(&[0, 2], &[1]), (&[], &[]), (&[1], &[0, 3])]);
        let mut items = vec![0u32; 16];
        let mut records = Vec::new();
        let total = pack_clusters(&cache, &mut items, &mut records).unwrap();

        assert_eq!(total, 6);
        assert_eq!(records[0], ClusterRecord { offset: 0, point_count: 2, spot_count: 1 });
        assert_eq!(records[1], ClusterRecord { offset: 3, point_count: 0, spot_count: 0 });
        assert_eq!(records[2], ClusterRecord { offset: 3, point_count: 1, spot_count: 2 });
        assert_eq!(&items[..6], &[0, 2, 1, 1, 0, 3]);
    }

    #[test]
    fn cache_resize_follows_cluster_count() {
        let mut cache = cache_with(&[(&[0], &[]), (&[1], &[0]), (&[2], &[])]);
        cache.resize(2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.total_items(), 3);

        cache.clear();
        cache.resize(4);
        assert_eq!(cache.len(), 4);
        assert_eq!(cache.total_items(), 0);
    }

    #[test]
    fn pack_rejects_u16_overflow() {
        let mut cache = ClusterCache::default();
        cache.resize(1);
        for i in 0..=u16::MAX as u32 {
            cache.push_point(0, i);
        }
        let mut items = vec![0u32; u16::MAX as usize + 1];
        let mut records = Vec::new();
        assert_eq!(
            pack_clusters(&cache, &mut items, &mut records),
            Err(ClusterError::ClusterOverflow { cluster: 0, count: 65_536 })
        );
    }

    #[test]
    fn growth_doubles_average() {
        let mut buffer = ItemBuffer::default();
        buffer.reset(4, 10, usize::MAX).unwrap();
        assert_eq!(buffer.capacity(), 40);
        assert!(!buffer.ensure_capacity(40, 10, usize::MAX).unwrap());
        assert!(buffer.ensure_capacity(41, 10, usize::MAX).unwrap());
        assert_eq!(buffer.avg_items_per_cluster(), 8);
        assert!(buffer.ensure_capacity(300, 10, usize::MAX).unwrap());
        assert_eq!(buffer.avg_items_per_cluster(), 32);
        assert_eq!(buffer.capacity(), 320);
    }

    #[test]
    fn growth_respects_block_limit() {
        let mut buffer = ItemBuffer::default();
        buffer.reset(4, 10, 160).unwrap();
        let err = buffer.ensure_capacity(41, 10, 160).unwrap_err();
        assert!(matches!(err, ClusterError::BufferTooLarge { requested: 320, limit: 160, .. }));
        assert_eq!(buffer.capacity(), 40);
    }
}
