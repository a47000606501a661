//! Feature flag and dispatcher behaviour.

use fastcsum::{
    ChecksumError, Dispatcher, Feature, Kernel, checksum, checksum_partial, feature_built_with,
    feature_cpu_has, feature_usable, global, reference_checksum, simd_acceleration_available,
};

#[test]
fn named_queries_match_typed_queries() {
    for feature in Feature::ALL {
        assert_eq!(feature_built_with(feature.name()), Ok(feature.built_with()));
        assert_eq!(feature_cpu_has(feature.name()), Ok(feature.cpu_has()));
        assert_eq!(feature_usable(feature.name()), Ok(feature.usable()));
    }
}

#[test]
fn usable_is_built_and_present() {
    for feature in Feature::ALL {
        assert_eq!(feature.usable(), feature.built_with() && feature.cpu_has(), "{feature}");
    }
}

#[test]
fn feature_answers_are_stable() {
    for feature in Feature::ALL {
        let first = feature.cpu_has();
        for _ in 0..8 {
            assert_eq!(feature.cpu_has(), first);
        }
    }
}

#[test]
fn feature_queries_are_consistent_across_threads() {
    let expected: Vec<bool> = Feature::ALL.iter().map(|f| f.usable()).collect();
    let handles: Vec<_> = (0..4)
        .map(|_| std::thread::spawn(|| Feature::ALL.iter().map(|f| f.usable()).collect::<Vec<_>>()))
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn unknown_feature_name_is_an_error() {
    assert!(matches!(
        feature_usable("3dnow"),
        Err(ChecksumError::UnknownFeature { .. })
    ));
}

#[test]
fn hardware_kernels_follow_their_feature() {
    for kernel in Kernel::ALL {
        match kernel.required_feature() {
            Some(feature) => {
                if kernel.is_available() {
                    assert!(feature.usable(), "{kernel} available without {feature}");
                }
            }
            None => assert!(kernel.is_available()),
        }
    }
}

#[test]
fn dispatcher_detects_backend() {
    let dispatcher = Dispatcher::detect();
    assert!(dispatcher.kernel().is_available());
    assert_eq!(
        simd_acceleration_available(),
        dispatcher.kernel().required_feature().is_some()
    );
}

#[test]
fn global_dispatcher_is_consistent() {
    let kernel = global().kernel();
    assert_eq!(global().kernel(), kernel);
    assert!(kernel.is_available());
}

#[test]
fn crate_level_helpers_use_global_dispatcher() {
    let data: Vec<u8> = (0..=255).collect();
    assert_eq!(checksum(&data), reference_checksum(&data));
    assert_eq!(checksum_partial(&data, 0), global().checksum_partial(&data, 0));
}

#[test]
fn pinned_dispatcher_rejects_unavailable_kernels() {
    for kernel in Kernel::ALL {
        match Dispatcher::with_kernel(kernel) {
            Ok(dispatcher) => assert_eq!(dispatcher.kernel(), kernel),
            Err(err) => {
                assert!(!kernel.is_available());
                assert!(matches!(err, ChecksumError::KernelUnavailable { .. }));
            }
        }
    }
}

const ABORT_CHILD_ENV: &str = "FASTCSUM_TEST_ABORT_CHILD";

#[test]
fn computing_with_unavailable_kernel_aborts() {
    let Some(kernel) = Kernel::ALL.into_iter().find(|k| !k.is_available()) else {
        return;
    };

    if std::env::var_os(ABORT_CHILD_ENV).is_some() {
        let _ = kernel.compute(&[1, 2], 0);
        // Only reached if the abort did not fire.
        std::process::exit(0);
    }

    let exe = std::env::current_exe().expect("test binary path");
    let output = std::process::Command::new(exe)
        .args(["--exact", "computing_with_unavailable_kernel_aborts", "--nocapture"])
        .env(ABORT_CHILD_ENV, "1")
        .output()
        .unwrap_or_else(|error| panic!("failed to re-run test binary: {error}"));

    assert!(!output.status.success(), "{kernel} ran without its CPU support");
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        const SIGABRT: i32 = 6;
        assert_eq!(output.status.signal(), Some(SIGABRT), "{kernel}: {:?}", output.status);
    }
}
