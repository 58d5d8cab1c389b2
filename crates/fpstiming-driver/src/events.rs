//! Frame events

use chrono::{DateTime, Utc};
use fpstiming_core::{AnimatorId, FrameReport};
use serde::{Deserialize, Serialize};

/// Event emitted by the frame driver
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameEvent {
    pub event_type: FrameEventType,
    /// Number of frames handled when the event was emitted
    pub frame: u64,
    pub timestamp: DateTime<Utc>,
}

/// Types of frame events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FrameEventType {
    /// Driver loop started
    Started { frame_interval_ms: u64 },
    /// One handler pass completed
    Frame {
        delta_ms: u64,
        animations: u64,
        tasks_executed: u64,
        frame_rate: f64,
    },
    /// An externally animated object is due; its registrar must run the
    /// callback `firings` times
    ExternalAnimation {
        animator_id: AnimatorId,
        firings: u64,
    },
    /// Driver loop ended
    Stopped { frames_driven: u64 },
}

impl FrameEvent {
    /// Create a new frame event
    pub fn new(event_type: FrameEventType, frame: u64) -> Self {
        Self {
            event_type,
            frame,
            timestamp: Utc::now(),
        }
    }

    /// Create a started event
    pub fn started(frame: u64, frame_interval_ms: u64) -> Self {
        Self::new(FrameEventType::Started { frame_interval_ms }, frame)
    }

    /// Create a stopped event
    pub fn stopped(frame: u64, frames_driven: u64) -> Self {
        Self::new(FrameEventType::Stopped { frames_driven }, frame)
    }

    /// Create the frame event summarizing `report`
    pub fn frame(report: &FrameReport, frame_rate: f64) -> Self {
        Self::new(
            FrameEventType::Frame {
                delta_ms: report.delta,
                animations: report.animations,
                tasks_executed: report.tasks_executed,
                frame_rate,
            },
            report.frame,
        )
    }

    /// Create one event per external firing in `report`
    pub fn external(report: &FrameReport) -> impl Iterator<Item = Self> + '_ {
        report.external.iter().map(move |firing| {
            Self::new(
                FrameEventType::ExternalAnimation {
                    animator_id: firing.animator,
                    firings: firing.firings,
                },
                report.frame,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_event_from_report() {
        let report = FrameReport {
            frame: 7,
            delta: 16,
            animations: 3,
            tasks_executed: 1,
            external: Vec::new(),
        };

        let event = FrameEvent::frame(&report, 60.0);
        assert_eq!(event.frame, 7);
        match event.event_type {
            FrameEventType::Frame {
                delta_ms,
                animations,
                tasks_executed,
                ..
            } => {
                assert_eq!(delta_ms, 16);
                assert_eq!(animations, 3);
                assert_eq!(tasks_executed, 1);
            }
            _ => panic!("Wrong event type"),
        }
        assert_eq!(FrameEvent::external(&report).count(), 0);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = FrameEvent::stopped(12, 10);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event_type"]["type"], "stopped");
        assert_eq!(json["event_type"]["frames_driven"], 10);
        assert_eq!(json["frame"], 12);

        let parsed: FrameEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }
}
