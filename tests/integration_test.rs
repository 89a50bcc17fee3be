//! Integration tests for colloc
//!
//! These tests drive whole collocations through the public API.

mod common;

use arrow_array::Array;
use colloc::kernel::{KernelContext, KernelResult, Neighbourhood};
use colloc::{
    collocate, CancellationToken, CollocError, CollocationOptions, Collocator, CommonData, Coord, DataList,
    Dataset, Dim, Kernel, Point, Reduction, Schema, SeparationConstraints, UngriddedData, VariableMeta,
};
use common::assertions::{assert_approx_eq, assert_identical, assert_values_eq};
use common::test_data;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn horizontal(degrees: f64) -> SeparationConstraints {
    SeparationConstraints::new().with_horizontal(degrees)
}

#[test]
fn test_repeated_runs_are_identical() {
    let source_points = test_data::scatter(2000, 7, (-30.0, 30.0), (-60.0, 60.0));
    let values: Vec<f64> = source_points.iter().map(|(a, b)| a * 0.5 + b).collect();
    let source = test_data::surface_points("aod", &source_points, &values);
    let target_points = test_data::scatter(1000, 11, (-35.0, 35.0), (-65.0, 65.0));
    let target = test_data::surface_points("track", &target_points, &vec![0.0; 1000]);

    for kernel in ["nn", "box"] {
        let options = CollocationOptions::new(kernel).with_constraints(horizontal(2.0));
        let first = collocate(source.view(), target.view(), &options).unwrap();
        let second = Collocator::new(options)
            .with_workers(Some(3))
            .collocate(source.view(), target.view())
            .unwrap();

        assert_identical(&first.data.values(), &second.data.values());
        assert_eq!(first.counts, second.counts);
        assert_eq!(first.summary, second.summary);
    }
}

#[test]
fn test_direction_neutral_calls_agree() {
    let points = test_data::scatter(300, 3, (-12.0, 12.0), (-5.0, 45.0));
    let values: Vec<f64> = points.iter().map(|(a, b)| a + b).collect();
    let source = test_data::surface_points("obs", &points, &values);
    let grid = test_data::lat_lon_grid(
        "model",
        &test_data::axis(-10.0, 5.0, 5),
        &test_data::axis(0.0, 10.0, 5),
        |_, _| 0.0,
    );
    let options = CollocationOptions::new("bin");

    let sampled = grid.sampled_from(&source, &options).unwrap();
    let onto = source.collocated_onto(&grid, &options).unwrap();
    let direct = collocate(source.view(), grid.view(), &options).unwrap();

    assert!(sampled.data.is_gridded());
    assert_identical(&sampled.data.values(), &onto.data.values());
    assert_identical(&sampled.data.values(), &direct.data.values());
    assert_eq!(sampled.counts, onto.counts);

    // every scattered point lies in exactly one cell
    let total: usize = sampled.counts.iter().sum();
    assert_eq!(total, 300);
}

#[test]
fn test_separation_limit_is_inclusive() {
    let source = test_data::surface_points("obs", &[(0.0, 0.0)], &[5.0]);
    let target = test_data::surface_points(
        "track",
        &[(1.0, 0.0), (1.0001, 0.0), (0.0, 1.0), (0.0, -1.0001)],
        &[0.0; 4],
    );
    let options = CollocationOptions::new("box").with_constraints(horizontal(1.0));

    let out = collocate(source.view(), target.view(), &options).unwrap();
    assert_values_eq(&out.data.values(), &[5.0, f64::NAN, 5.0, f64::NAN], None);
    assert_eq!(out.counts, vec![1, 0, 1, 0]);
}

#[test]
fn test_missing_data_policy() {
    let source = test_data::surface_points("obs", &[(0.0, 0.0)], &[5.0]);
    let target = test_data::surface_points("track", &[(10.0, 10.0)], &[0.0]);
    let options = CollocationOptions::new("nn").with_constraints(horizontal(1.0));

    let out = collocate(source.view(), target.view(), &options).unwrap();
    let point = &out.data.get_all_points()[0];
    assert!(!point.is_valid());
    assert_eq!(out.summary.valid, 0);
    assert_eq!(out.summary.empty, 1);

    let out = collocate(source.view(), target.view(), &options.with_fill_value(-999.0)).unwrap();
    let point = &out.data.get_all_points()[0];
    assert!(point.is_valid());
    assert_eq!(point.value(), -999.0);
    assert_eq!(out.summary.filled, 1);
}

#[test]
fn test_missing_sample_value() {
    let source = test_data::surface_points("obs", &[(0.0, 0.0)], &[5.0]);
    let target = test_data::surface_points("track", &[(0.0, 0.0), (0.1, 0.0)], &[f64::NAN, 1.0]);

    let out = collocate(source.view(), target.view(), &CollocationOptions::default()).unwrap();
    assert_values_eq(&out.data.values(), &[f64::NAN, 5.0], None);

    let options = CollocationOptions::default().with_missing_data_for_missing_sample(false);
    let out = collocate(source.view(), target.view(), &options).unwrap();
    assert_values_eq(&out.data.values(), &[5.0, 5.0], None);
}

#[test]
fn test_nearest_neighbour_ties_follow_source_order() {
    let target = test_data::latitude_line("track", &[0.0], &[0.0]);

    let source = test_data::latitude_line("obs", &[-1.0, 1.0], &[10.0, 20.0]);
    let out = collocate(source.view(), target.view(), &CollocationOptions::new("nn")).unwrap();
    assert_eq!(out.data.values(), vec![10.0]);

    let source = test_data::latitude_line("obs", &[1.0, -1.0], &[20.0, 10.0]);
    let out = collocate(source.view(), target.view(), &CollocationOptions::new("nn")).unwrap();
    assert_eq!(out.data.values(), vec![20.0]);
}

#[test]
fn test_nearest_neighbour_agrees_between_grid_and_scatter() {
    let lats = [0.0, 30.0, 60.0];
    let lons = [0.0, 120.0, 240.0];
    let value = |lat: f64, lon: f64| lat * 1000.0 + lon;

    let grid = test_data::lat_lon_grid("model", &lats, &lons, value);
    let lattice: Vec<(f64, f64)> = lats
        .iter()
        .flat_map(|&lat| lons.iter().map(move |&lon| (lat, lon)))
        .collect();
    let values: Vec<f64> = lattice.iter().map(|&(lat, lon)| value(lat, lon)).collect();
    let scattered = test_data::surface_points("model", &lattice, &values);

    let mut targets = vec![(29.0, 60.0)];
    targets.extend(test_data::scatter(200, 5, (-80.0, 80.0), (-180.0, 180.0)));
    let track = test_data::surface_points("track", &targets, &vec![0.0; targets.len()]);

    let options = CollocationOptions::new("nn");
    let from_grid = collocate(grid.view(), track.view(), &options).unwrap();
    let from_scatter = collocate(scattered.view(), track.view(), &options).unwrap();

    // 60N 0E is closer to 29N 60E than 30N 0E is
    assert_eq!(from_grid.data.values()[0], 60000.0);
    assert_identical(&from_grid.data.values(), &from_scatter.data.values());
}

#[test]
fn test_linear_brackets_without_extrapolation() {
    let source = test_data::latitude_grid("model", &[2.0, 3.0], &[10.0, 20.0]);
    let target = test_data::latitude_line("track", &[2.5, 0.5, 3.0], &[0.0; 3]);

    let out = collocate(source.view(), target.view(), &CollocationOptions::new("lin")).unwrap();
    let values = out.data.values();
    assert_approx_eq(values[0], 15.0, None);
    assert!(values[1].is_nan());
    assert_approx_eq(values[2], 20.0, None);
}

#[test]
fn test_bilinear_on_lat_lon_grid() {
    let grid = test_data::lat_lon_grid(
        "model",
        &test_data::axis(-10.0, 5.0, 5),
        &test_data::axis(0.0, 10.0, 36),
        |lat, lon| 2.0 * lat + lon,
    );
    let target = test_data::surface_points(
        "track",
        &[(2.5, 7.5), (-7.0, 123.4), (20.0, 50.0)],
        &[0.0; 3],
    );

    let out = collocate(grid.view(), target.view(), &CollocationOptions::new("lin")).unwrap();
    assert_values_eq(&out.data.values(), &[12.5, 109.4, f64::NAN], Some(1e-9));
    assert_eq!(out.counts[0], 4);
}

#[test]
fn test_linear_rejects_ungridded_source() {
    let source = test_data::latitude_line("obs", &[0.0, 1.0], &[1.0, 2.0]);
    let target = test_data::latitude_line("track", &[0.5], &[0.0]);

    let err = collocate(source.view(), target.view(), &CollocationOptions::new("lin")).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_frame_is_shared_dimensions() {
    let grid = test_data::lat_lon_grid(
        "model",
        &test_data::axis(-10.0, 1.0, 21),
        &test_data::axis(0.0, 1.0, 20),
        |lat, lon| lat * 100.0 + lon,
    );
    let track = test_data::track("flight", &[(2.2, 3.7, 0.5), (-3.6, 10.4, 1.0)], &[0.0, 0.0]);

    let out = collocate(grid.view(), track.view(), &CollocationOptions::new("nn")).unwrap();
    assert_eq!(out.data.values(), vec![204.0, -390.0]);
    assert_eq!(out.data.schema(), track.schema());
}

#[test]
fn test_box_with_time_window_and_reductions() {
    let source = test_data::track(
        "obs",
        &[(0.0, 0.0, 0.0), (0.0, 0.0, 2.0), (0.5, 0.0, 0.4)],
        &[1.0, 2.0, 3.0],
    );
    let target = test_data::track("flight", &[(0.0, 0.0, 0.5)], &[0.0]);
    let constraints = horizontal(1.0).with_temporal(1.0);

    let mean = CollocationOptions::new("box").with_constraints(constraints);
    let out = collocate(source.view(), target.view(), &mean).unwrap();
    assert_eq!(out.data.values(), vec![2.0]);
    assert_eq!(out.counts, vec![2]);

    let max = mean.clone().with_reduction(Reduction::Max);
    let out = collocate(source.view(), target.view(), &max).unwrap();
    assert_eq!(out.data.values(), vec![3.0]);

    let count = mean.with_reduction(Reduction::Count);
    let out = collocate(source.view(), target.view(), &count).unwrap();
    assert_eq!(out.data.values(), vec![2.0]);
}

#[test]
fn test_vertical_separation_across_units() {
    let profile = |name: &str, coord: Coord, heights: &[f64], values: &[f64]| {
        UngriddedData::new(
            VariableMeta::new(name),
            Schema::new(vec![Coord::latitude(), coord]).unwrap(),
            vec![vec![0.0; heights.len()], heights.to_vec()],
            values.to_vec(),
        )
        .unwrap()
    };
    let options =
        CollocationOptions::new("box").with_constraints(SeparationConstraints::new().with_vertical(250.0));

    // kilometres against metres
    let source = profile("ext", Coord::new(Dim::Altitude, "alt", "km"), &[0.9, 1.2, 1.5], &[1.0, 2.0, 3.0]);
    let target = profile("track", Coord::altitude(), &[1000.0], &[0.0]);
    let out = collocate(source.view(), target.view(), &options).unwrap();
    assert_values_eq(&out.data.values(), &[1.5], None);
    assert_eq!(out.counts, vec![2]);

    // pascal against hectopascal
    let options =
        CollocationOptions::new("box").with_constraints(SeparationConstraints::new().with_vertical(10.0));
    let source = profile(
        "ext",
        Coord::new(Dim::AirPressure, "pres", "Pa"),
        &[95000.0, 99000.0, 101000.0],
        &[10.0, 20.0, 30.0],
    );
    let target = profile("track", Coord::air_pressure(), &[1000.0], &[0.0]);
    let out = collocate(source.view(), target.view(), &options).unwrap();
    assert_values_eq(&out.data.values(), &[25.0], None);
    assert_eq!(out.counts, vec![2]);
}

#[test]
fn test_output_naming_and_history() {
    let source = test_data::track("obs", &[(0.0, 0.0, 0.0)], &[1.0]);
    let target = test_data::track("flight", &[(0.0, 0.0, 0.0)], &[0.0]);

    let out = collocate(source.view(), target.view(), &CollocationOptions::default()).unwrap();
    assert_eq!(out.data.var_name(), "obs");
    assert_eq!(out.data.filenames(), &["obs.csv".to_string()]);

    let options = CollocationOptions::new("box")
        .with_constraints(horizontal(0.5))
        .with_var_name("obs_on_flight");
    let out = collocate(source.view(), target.view(), &options).unwrap();
    assert_eq!(out.data.var_name(), "obs_on_flight");
    assert!(out.data.history().contains("kernel 'box'"));
    assert!(out.data.history().contains("horizontal_separation=0.5"));
    assert!(out.data.history().contains("flight.csv"));

    let counts = out.count_dataset().unwrap();
    assert_eq!(counts.var_name(), "obs_on_flight_num_points");
}

#[test]
fn test_result_as_data_frame() {
    let source = test_data::surface_points("obs", &[(0.0, 0.0)], &[5.0]);
    let target = test_data::surface_points("track", &[(0.0, 0.0), (30.0, 30.0)], &[0.0, 0.0]);
    let options = CollocationOptions::new("nn").with_constraints(horizontal(1.0));

    let out = collocate(source.view(), target.view(), &options).unwrap();
    let frame = out.data.as_data_frame().unwrap();
    assert_eq!(frame.num_rows(), 2);
    assert_eq!(frame.num_columns(), 3);
    assert_eq!(frame.column(2).null_count(), out.summary.invalid);
}

#[test]
fn test_invalid_fraction_tolerance() {
    let source = test_data::latitude_line("obs", &[0.0], &[1.0]);
    let target = test_data::latitude_line("track", &[0.0, 5.0, 10.0, 15.0], &[0.0; 4]);
    let options = CollocationOptions::new("nn").with_constraints(horizontal(1.0));

    let out = collocate(source.view(), target.view(), &options).unwrap();
    assert_approx_eq(out.summary.invalid_fraction(), 0.75, None);
    assert!(out.check_tolerance(0.8).is_ok());
    assert!(matches!(
        out.check_tolerance(0.5),
        Err(CollocError::InsufficientData { .. })
    ));
}

#[derive(Debug)]
struct FailingKernel;

impl Kernel for FailingKernel {
    fn name(&self) -> &str {
        "failing"
    }

    fn neighbourhood(&self) -> Neighbourhood {
        Neighbourhood::Window
    }

    fn aggregate(&self, _ctx: &KernelContext<'_>, _target: &Point, _candidates: &[usize]) -> colloc::Result<KernelResult> {
        Err(CollocError::Kernel {
            message: "not today".to_string(),
        })
    }
}

#[derive(Debug)]
struct SumKernel;

impl Kernel for SumKernel {
    fn name(&self) -> &str {
        "sum"
    }

    fn neighbourhood(&self) -> Neighbourhood {
        Neighbourhood::Window
    }

    fn aggregate(&self, ctx: &KernelContext<'_>, _target: &Point, candidates: &[usize]) -> colloc::Result<KernelResult> {
        let sum = candidates.iter().map(|&i| ctx.point(i).value()).sum();
        Ok(KernelResult::valid(sum, candidates.len()))
    }
}

#[test]
fn test_custom_kernels() {
    let source = test_data::latitude_line("obs", &[0.0, 0.5, 3.0], &[1.0, 2.0, 4.0]);
    let target = test_data::latitude_line("track", &[0.2, 2.8], &[0.0, 0.0]);
    let options = CollocationOptions::default().with_constraints(horizontal(1.0));

    let out = Collocator::new(options.clone())
        .with_kernel(Arc::new(SumKernel))
        .collocate(source.view(), target.view())
        .unwrap();
    assert_eq!(out.data.values(), vec![3.0, 4.0]);

    let err = Collocator::new(options)
        .with_kernel(Arc::new(FailingKernel))
        .collocate(source.view(), target.view())
        .unwrap_err();
    assert!(matches!(err, CollocError::Kernel { .. }));
}

#[test]
fn test_cancellation_token() {
    let source = test_data::latitude_line("obs", &[0.0], &[1.0]);
    let target = test_data::latitude_line("track", &test_data::axis(0.0, 0.1, 100), &[0.0; 100]);
    let token = CancellationToken::new();
    let mut collocator = Collocator::new(CollocationOptions::default()).with_cancellation(token.clone());
    token.cancel();

    let err = collocator.collocate(source.view(), target.view()).unwrap_err();
    assert!(matches!(err, CollocError::Cancelled { total: 100, .. }));
}

#[test]
fn test_collections_reject_mixed_structures() {
    let mut list = DataList::ungridded();
    list.append(Dataset::from(test_data::track("a", &[(0.0, 0.0, 0.0)], &[1.0])))
        .unwrap();

    let grid = test_data::latitude_grid("g", &[0.0, 1.0], &[1.0, 2.0]);
    let err = list.append(Dataset::from(grid)).unwrap_err();
    assert!(matches!(err, CollocError::TypeMismatch { .. }));
    assert_eq!(list.len(), 1);
    assert_eq!(list.var_names(), vec!["a"]);
}

#[test]
fn test_collection_names_and_files() {
    let list = DataList::try_from(vec![
        Dataset::from(test_data::track("a", &[(0.0, 0.0, 0.0)], &[1.0])),
        Dataset::from(test_data::track("b", &[(1.0, 0.0, 0.0)], &[2.0])),
        Dataset::from(test_data::track("c", &[(2.0, 0.0, 0.0)], &[3.0])),
    ])
    .unwrap();

    assert_eq!(list.var_names(), vec!["a", "b", "c"]);
    assert_eq!(list.filenames(), vec!["a.csv", "b.csv", "c.csv"]);
}

#[test]
fn test_job_json_round_trip() {
    let source = test_data::lat_lon_grid("model", &[0.0, 1.0], &[0.0, 1.0], |lat, lon| lat + lon);
    let json = serde_json::to_string(&Dataset::from(source.clone())).unwrap();
    let back: Dataset = serde_json::from_str(&json).unwrap();

    assert!(back.is_gridded());
    assert_eq!(back.var_name(), "model");
    assert_identical(&back.values(), &Dataset::from(source).values());
}
