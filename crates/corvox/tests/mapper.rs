//! End-to-end tests of mapper construction, caching, and application
//! over a small synthetic subject.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use approx::assert_relative_eq;

use corvox::{
    Affine, GeometryError, GeometrySource, Grid, HemiPair, Mapper, MapperError, OperatorStore,
    Point3, Series, StoreConfig, Strategy, SurfaceKind, TransformInfo, TriMesh, VertexInput,
};

/// In-memory geometry source over two tiny synthetic hemispheres.
///
/// Counts `surface` calls so tests can observe whether a mapper was
/// rebuilt or served from cache, and lets tests move the transform's
/// modification time to force staleness.
struct TestSource {
    grid: Grid,
    modified: Mutex<SystemTime>,
    surface_calls: AtomicUsize,
}

impl TestSource {
    fn new() -> Self {
        Self {
            grid: Grid::new(10, 10, 10),
            modified: Mutex::new(UNIX_EPOCH),
            surface_calls: AtomicUsize::new(0),
        }
    }

    fn fetches(&self) -> usize {
        self.surface_calls.load(Ordering::SeqCst)
    }

    fn touch_transform(&self) {
        *self.modified.lock().unwrap() = SystemTime::now() + Duration::from_secs(3600);
    }

    fn left_points() -> Vec<Point3> {
        vec![
            Point3::new(4.0, 3.0, 2.0), // voxel (z, y, x) = (2, 3, 4)
            Point3::new(5.0, 5.0, 5.0),
            Point3::new(5.1, 5.2, 4.9), // rounds into the same voxel as above
        ]
    }

    fn right_points() -> Vec<Point3> {
        vec![
            Point3::new(7.0, 7.0, 7.0),
            Point3::new(2.0, 2.0, 2.0),
            Point3::new(3.0, 2.0, 2.0),
        ]
    }
}

impl GeometrySource for TestSource {
    fn surface(
        &self,
        _subject: &str,
        kind: SurfaceKind,
    ) -> Result<HemiPair<TriMesh>, GeometryError> {
        self.surface_calls.fetch_add(1, Ordering::SeqCst);
        let offset = match kind {
            SurfaceKind::Pial => 0.5,
            SurfaceKind::WhiteMatter => -0.5,
            _ => 0.0,
        };
        let lift = |points: Vec<Point3>| {
            TriMesh::new(
                points
                    .into_iter()
                    .map(|p| Point3::new(p.x, p.y, p.z + offset))
                    .collect(),
                vec![[0, 1, 2]],
            )
        };
        Ok(HemiPair::new(
            lift(Self::left_points()),
            lift(Self::right_points()),
        ))
    }

    fn transform(&self, _subject: &str, _name: &str) -> Result<TransformInfo, GeometryError> {
        Ok(TransformInfo {
            affine: Affine::identity(),
            grid: self.grid,
            modified: *self.modified.lock().unwrap(),
        })
    }
}

fn store() -> (tempfile::TempDir, OperatorStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = OperatorStore::new(StoreConfig::new(dir.path()));
    (dir, store)
}

fn nearest_mapper(store: &OperatorStore, source: &TestSource) -> Mapper {
    Mapper::new(store, source, "S1", "fullhead", Strategy::Nearest, false).unwrap()
}

// linear indices of the test vertices' voxels; left vertices 1 and 2
// share voxel 555, so there are 5 active voxels for 6 vertices
const L0: usize = 234;
const L1: usize = 555;
const R0: usize = 777;
const R1: usize = 222;
const R2: usize = 223;

#[test]
fn test_nearest_mapper_forward_application() {
    let (_dir, store) = store();
    let source = TestSource::new();
    let mapper = nearest_mapper(&store, &source);

    assert_eq!(mapper.nverts(), 6);
    assert_eq!(mapper.operators().left.rows(), 3);

    let mut data = vec![0.0; mapper.grid().len()];
    data[L0] = 7.0;
    data[L1] = 1.0;
    data[R0] = 2.0;
    let (left, right) = mapper.apply(&Series::from_vec(data)).unwrap();
    // left vertices 1 and 2 read the same voxel
    assert_eq!(left.values(), &[7.0, 1.0, 1.0]);
    assert_eq!(right.values(), &[2.0, 0.0, 0.0]);
}

#[test]
fn test_apply_per_vertex_data_is_a_split() {
    let (_dir, store) = store();
    let source = TestSource::new();
    let mapper = nearest_mapper(&store, &source);

    let data = Series::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let (left, right) = mapper.apply(&data).unwrap();
    assert_eq!(left.values(), &[1.0, 2.0, 3.0]);
    assert_eq!(right.values(), &[4.0, 5.0, 6.0]);
}

#[test]
fn test_apply_masked_volume_scatters_through_mask() {
    let (_dir, store) = store();
    let source = TestSource::new();
    let mapper = nearest_mapper(&store, &source);

    // active voxels in grid order: 222, 223, 234, 555, 777
    assert_eq!(mapper.active_voxels(), 5);
    let masked = Series::from_vec(vec![10.0, 20.0, 30.0, 40.0, 50.0]);
    let (left, right) = mapper.apply(&masked).unwrap();
    assert_eq!(left.values(), &[30.0, 40.0, 40.0]);
    assert_eq!(right.values(), &[50.0, 10.0, 20.0]);
}

#[test]
fn test_apply_time_series() {
    let (_dir, store) = store();
    let source = TestSource::new();
    let mapper = nearest_mapper(&store, &source);

    let mut values = vec![0.0; 2 * mapper.grid().len()];
    values[L0] = 1.0;
    values[mapper.grid().len() + L0] = 5.0;
    let series = Series::new(values, 2).unwrap();
    let (left, _right) = mapper.apply(&series).unwrap();
    assert_eq!(left.samples(), 2);
    assert_eq!(left.sample(0), &[1.0, 0.0, 0.0]);
    assert_eq!(left.sample(1), &[5.0, 0.0, 0.0]);
}

#[test]
fn test_apply_rejects_unrecognized_shape() {
    let (_dir, store) = store();
    let source = TestSource::new();
    let mapper = nearest_mapper(&store, &source);

    let result = mapper.apply(&Series::from_vec(vec![0.0; 7]));
    assert!(matches!(result, Err(MapperError::InputShape(_))));
}

#[test]
fn test_apply_inverse_recovers_voxel_placement() {
    let (_dir, store) = store();
    let source = TestSource::new();
    let mapper = nearest_mapper(&store, &source);

    // forward: voxel value lands on vertex 0
    let mut data = vec![0.0; mapper.grid().len()];
    data[L0] = 3.0;
    let (left, _) = mapper.apply(&Series::from_vec(data)).unwrap();
    assert_eq!(left.values()[0], 3.0);

    // backward: the vertex value lands back on its voxel alone
    let vertex_values = [3.0, 0.0, 0.0, 0.0, 0.0, 0.0];
    let (lvol, rvol) = mapper
        .apply_inverse(VertexInput::Values(&vertex_values))
        .unwrap();
    assert_eq!(lvol.value_at(2, 3, 4), 3.0);
    assert_eq!(lvol.values.iter().sum::<f64>(), 3.0);
    assert_eq!(rvol.values.iter().sum::<f64>(), 0.0);
}

#[test]
fn test_apply_inverse_index_forms() {
    let (_dir, store) = store();
    let source = TestSource::new();
    let mapper = nearest_mapper(&store, &source);

    // global indices: one per hemisphere
    let (lvol, rvol) = mapper
        .apply_inverse(VertexInput::Indices(&[0, 3]))
        .unwrap();
    assert_eq!(lvol.values[L0], 1.0);
    assert_eq!(rvol.values[R0], 1.0);

    // per-hemisphere indices
    let (lvol, rvol) = mapper
        .apply_inverse(VertexInput::IndexPair(&[1], &[2]))
        .unwrap();
    assert_eq!(lvol.values[L1], 1.0);
    assert_eq!(rvol.values[R2], 1.0);
}

#[test]
fn test_apply_inverse_rejects_out_of_range_index() {
    let (_dir, store) = store();
    let source = TestSource::new();
    let mapper = nearest_mapper(&store, &source);

    assert!(matches!(
        mapper.apply_inverse(VertexInput::Indices(&[6])),
        Err(MapperError::InputShape(_))
    ));
    assert!(matches!(
        mapper.apply_inverse(VertexInput::IndexPair(&[3], &[])),
        Err(MapperError::InputShape(_))
    ));
    assert!(matches!(
        mapper.apply_inverse(VertexInput::Values(&[1.0; 5])),
        Err(MapperError::InputShape(_))
    ));
    assert!(matches!(
        mapper.apply_inverse(VertexInput::ValuePair(&[1.0; 3], &[1.0; 2])),
        Err(MapperError::InputShape(_))
    ));
}

#[test]
fn test_mask_is_or_of_hemimasks() {
    let (_dir, store) = store();
    let source = TestSource::new();
    let mapper = nearest_mapper(&store, &source);

    let hemimasks = mapper.hemimasks();
    for (i, &m) in mapper.mask().iter().enumerate() {
        assert_eq!(m, hemimasks.left[i] || hemimasks.right[i]);
    }
    for idx in [L0, L1, R0, R1, R2] {
        assert!(mapper.mask()[idx]);
    }
    for &col in mapper
        .operators()
        .left
        .indices()
        .iter()
        .chain(mapper.operators().right.indices())
    {
        assert!(mapper.mask()[col as usize]);
    }
}

#[test]
fn test_second_construction_hits_cache() {
    let (_dir, store) = store();
    let source = TestSource::new();

    let first = nearest_mapper(&store, &source);
    let after_build = source.fetches();
    assert!(after_build > 0);

    let second = nearest_mapper(&store, &source);
    assert_eq!(source.fetches(), after_build, "cache hit must not rebuild");
    assert_eq!(first.operators().left, second.operators().left);
    assert_eq!(first.operators().right, second.operators().right);
}

#[test]
fn test_recache_flag_forces_rebuild() {
    let (_dir, store) = store();
    let source = TestSource::new();

    nearest_mapper(&store, &source);
    let after_build = source.fetches();

    Mapper::new(&store, &source, "S1", "fullhead", Strategy::Nearest, true).unwrap();
    assert!(source.fetches() > after_build);
}

#[test]
fn test_stale_cache_triggers_rebuild() {
    let (dir, store) = store();
    let source = TestSource::new();

    nearest_mapper(&store, &source);
    let after_build = source.fetches();
    let artifact = dir
        .path()
        .join("S1")
        .join("fullhead_nearest.opr");
    let old_mtime = artifact.metadata().unwrap().modified().unwrap();

    // move the transform definition past the artifact's timestamp
    source.touch_transform();
    nearest_mapper(&store, &source);
    assert!(source.fetches() > after_build, "stale cache must rebuild");
    let new_mtime = artifact.metadata().unwrap().modified().unwrap();
    assert!(new_mtime >= old_mtime);
}

#[test]
fn test_unsupported_strategy_is_fatal_and_writes_nothing() {
    let (dir, store) = store();
    let source = TestSource::new();

    let result = Mapper::new(
        &store,
        &source,
        "S1",
        "fullhead",
        Strategy::Gaussian { std: 2.0 },
        false,
    );
    assert!(matches!(
        result,
        Err(MapperError::UnsupportedStrategy(ref tag)) if tag == "gaussian"
    ));
    assert_eq!(source.fetches(), 0);
    assert!(!dir.path().join("S1").exists());
}

#[test]
fn test_trilinear_rows_sum_to_one() {
    let (_dir, store) = store();
    let source = TestSource::new();
    let mapper = Mapper::new(&store, &source, "S1", "fullhead", Strategy::Trilinear, false)
        .unwrap();

    for hemi in [&mapper.operators().left, &mapper.operators().right] {
        for row in 0..hemi.rows() {
            assert_relative_eq!(hemi.row_sum(row), 1.0, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_lanczos_rows_sum_to_one() {
    let (_dir, store) = store();
    let source = TestSource::new();
    let mapper = Mapper::new(
        &store,
        &source,
        "S1",
        "fullhead",
        Strategy::lanczos(),
        false,
    )
    .unwrap();

    for hemi in [&mapper.operators().left, &mapper.operators().right] {
        assert_eq!(hemi.rows(), 3);
        for row in 0..hemi.rows() {
            assert_relative_eq!(hemi.row_sum(row), 1.0, epsilon = 1e-12);
            for &w in hemi.row(row).1 {
                assert!(w.is_finite());
            }
        }
    }
}

#[test]
fn test_polyhedral_mapper_distributes_column_volume() {
    let (_dir, store) = store();
    let source = TestSource::new();
    let mapper = Mapper::new(&store, &source, "S1", "fullhead", Strategy::Polyhedral, false)
        .unwrap();

    // every column lies inside the grid, so its overlap fractions tile
    // the full volume element
    for hemi in [&mapper.operators().left, &mapper.operators().right] {
        for row in 0..hemi.rows() {
            assert_relative_eq!(hemi.row_sum(row), 1.0, epsilon = 1e-6);
        }
    }
}

#[test]
fn test_idxmap_permutes_mapped_output() {
    let (_dir, store) = store();
    let source = TestSource::new();
    let mapper = nearest_mapper(&store, &source)
        .with_idxmap(HemiPair::new(vec![2, 1, 0], vec![0, 1, 2]))
        .unwrap();

    let data = Series::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let (left, right) = mapper.apply(&data).unwrap();
    assert_eq!(left.values(), &[3.0, 2.0, 1.0]);
    assert_eq!(right.values(), &[4.0, 5.0, 6.0]);
}

#[test]
fn test_idxmap_rejects_out_of_range() {
    let (_dir, store) = store();
    let source = TestSource::new();
    let result = nearest_mapper(&store, &source)
        .with_idxmap(HemiPair::new(vec![3], vec![0]));
    assert!(matches!(result, Err(MapperError::InputShape(_))));
}

#[test]
fn test_display_names_the_strategy() {
    let (_dir, store) = store();
    let source = TestSource::new();
    let mapper = nearest_mapper(&store, &source);
    assert_eq!(
        mapper.to_string(),
        "<Nearest mapper for (S1, fullhead) with 6 vertices>"
    );
}
