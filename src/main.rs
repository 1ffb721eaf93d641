use flowmetaball::prelude::*;
use winit::event_loop::{ControlFlow, EventLoop};

fn main() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(
        SceneConfig::default(),
        MetaballConfig::default(),
        CloudConfig::default(),
    );
    event_loop.run_app(&mut app)?;

    match app.take_error() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
