//! Answering configure requests

use crate::{
    error::WmResult,
    manager::WindowManager,
    monitor::{client::ClientState, Env},
    x::{
        event::{ConfigureRequestData, WindowChanges, XEvent},
        session::DisplaySession,
    },
};

/// What is granted to a window the manager does not manage
fn grant(changes: WindowChanges) -> WindowChanges {
    WindowChanges {
        width: changes.width.map(|w| w.max(1)),
        height: changes.height.map(|h| h.max(1)),
        ..changes
    }
}

impl<S: DisplaySession> WindowManager<S> {
    pub(crate) fn on_configure_request(&mut self, event: XEvent) -> WmResult<()> {
        let ConfigureRequestData { id: window, changes } = match event {
            XEvent::ConfigureRequest(data) => data,
            _ => return Ok(()),
        };

        if self.registry.find_frame(window).is_some() {
            return Ok(());
        }

        let managed = self.registry.find(window).filter(|&id| {
            self.registry
                .get(id)
                .map_or(false, |c| c.state() != ClientState::Withdrawn)
        });

        match managed {
            Some(id) => {
                let env = Env::new(&self.session, &*self.theme, &self.config);
                let rect = self.registry.move_resize(&env, id, changes)?;
                if changes.stack_mode.is_some() {
                    self.registry.raise(&env, id)?;
                }
                // The client learns its geometry even when nothing moved
                self.session.send_configure_notify(window, rect)
            },
            None => {
                let granted = grant(changes);
                log::trace!("configuring unmanaged Window({:#0x}): {:?}", window, granted);
                self.session.configure_window(window, &granted)?;

                if granted != changes {
                    let current = self.session.get_geometry(window)?;
                    self.session
                        .send_configure_notify(window, granted.merge(current))?;
                }
                Ok(())
            },
        }
    }
}
