use std::path::PathBuf;

use dicom_voxel_editor::{
    InteractionHandler, ViewerConfig, ViewerSession, logging, region::mm3_to_cm3,
};

fn main() {
    logging::init();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => ViewerConfig::from_file(&path).expect("should have read config file"),
        None => ViewerConfig::default(),
    };
    let steps = config.steps_per_sweep;
    let interval = config.tick_interval();

    let mut session = ViewerSession::new(config);
    session
        .load_from_config()
        .expect("should have loaded body and editable series");

    let total = session.total_volume().expect("volumes are loaded");
    println!("Volume: {:.4} cm^3", mm3_to_cm3(total));

    let center = session.body().expect("volumes are loaded").center();
    match session.on_pick(center) {
        Ok(modified) => log::info!("Brush modified {} voxels at {:?}", modified, center),
        Err(err) => log::warn!("Brush stroke at {:?} skipped: {}", center, err),
    }

    for _ in 0..steps {
        let report = session.on_tick().expect("volumes are loaded");
        log::info!(
            "z={:.2} visible volume {:.4} cm^3",
            report.position,
            mm3_to_cm3(report.volume_mm3)
        );
        std::thread::sleep(interval);
    }
}
