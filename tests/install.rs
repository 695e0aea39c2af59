//! End-to-end installs against the real Miniconda distribution and package
//! indexes. They need network access and several minutes each, so they are
//! ignored by default:
//!
//! ```bash
//! cargo test --test install -- --ignored --nocapture
//! ```

use std::path::Path;

use mcinstall::{MinicondaInstaller, CONFIG};

/// Imports `module` with the prefix's interpreter and prints `<module> <version> ok`.
fn import_report(mci: &MinicondaInstaller, module: &str, version_expr: &str) -> String {
    let code = format!(
        "import {m}; print(\"{m} %s ok\" % {v})",
        m = module,
        v = version_expr
    );
    mci.run_python(&["-c", code.as_str()]).unwrap()
}

fn assert_import_ok(report: &str, module: &str) {
    println!("{}", report);
    assert!(report.starts_with(&format!("{} ", module)), "{}", report);
    assert!(report.ends_with(" ok"), "{}", report);
    assert!(report.len() > module.len() + " ok".len() + 1, "{}", report);
}

/// Fresh installation with the base environment updated.
fn installed(prefix: &Path) -> MinicondaInstaller {
    let mut mci = MinicondaInstaller::new(prefix, true);
    mci.download().unwrap();
    mci.install_miniconda().unwrap();
    mci.update_miniconda_base().unwrap();
    mci
}

#[test]
fn test_show_config() {
    let json = CONFIG.to_json().unwrap();
    println!("{}", json);
    assert!(json.contains("\"system\""));
}

#[test]
#[ignore = "downloads Miniconda and packages"]
fn test_install_dependencies() {
    let tempdir = tempfile::tempdir().unwrap();
    let prefix = tempdir.path().to_path_buf();

    {
        let mci = installed(&prefix);
        assert!(prefix.join("bin").join("python").exists() || cfg!(windows));

        mci.install_pip(&["geopy"], None, None).unwrap();
        mci.install_conda("conda-forge", &["pyyaml"]).unwrap();

        for module in ["geopy", "yaml"] {
            let report = import_report(&mci, module, &format!("{}.__version__", module));
            assert_import_ok(&report, module);
        }
    }

    tempdir.close().unwrap();
    assert!(!prefix.exists());
}

#[test]
#[ignore = "downloads Miniconda and packages"]
fn test_install_dependencies_index_url() {
    let tempdir = tempfile::tempdir().unwrap();
    let prefix = tempdir.path().to_path_buf();

    {
        let mci = installed(&prefix);
        mci.install_pip(
            &["pypi_pkg_test"],
            Some("https://test.pypi.org/simple/"),
            None,
        )
        .unwrap();

        let report = import_report(&mci, "pypi_pkg_test", "pypi_pkg_test");
        assert_import_ok(&report, "pypi_pkg_test");
    }

    tempdir.close().unwrap();
    assert!(!prefix.exists());
}

#[test]
#[ignore = "downloads Miniconda and packages"]
fn test_install_dependencies_extra_index_url() {
    let tempdir = tempfile::tempdir().unwrap();
    let prefix = tempdir.path().to_path_buf();

    {
        let mci = installed(&prefix);
        mci.install_pip(
            &["pypi_pkg_test"],
            Some("https://test.pypi.org/simpletest/"),
            Some("https://test.pypi.org/simple/"),
        )
        .unwrap();

        let report = import_report(&mci, "pypi_pkg_test", "pypi_pkg_test");
        assert_import_ok(&report, "pypi_pkg_test");
    }

    tempdir.close().unwrap();
    assert!(!prefix.exists());
}

#[test]
#[ignore = "downloads Miniconda and packages"]
fn test_install_dependencies_extra_index_urls() {
    let tempdir = tempfile::tempdir().unwrap();
    let prefix = tempdir.path().to_path_buf();

    {
        let mci = installed(&prefix);
        mci.install_pip(
            &["pypi_pkg_test"],
            Some("https://test.pypi.org/simpletest/"),
            Some("https://test.pypi.org/simpletest1/, https://test.pypi.org/simple/"),
        )
        .unwrap();

        let report = import_report(&mci, "pypi_pkg_test", "pypi_pkg_test");
        assert_import_ok(&report, "pypi_pkg_test");
    }

    tempdir.close().unwrap();
    assert!(!prefix.exists());
}
