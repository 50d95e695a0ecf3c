//! Sample-log library: canned raw records for each recognized pipeline
//! kind, used by the `/library` control-plane endpoints and by the UI's
//! "try it" preview flows. Read-only and process-static — there is no
//! persistence layer for this beyond the binary itself.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct LibrarySample {
    pub name: String,
    pub description: String,
    pub sample: String,
}

pub fn all() -> Vec<LibrarySample> {
    vec![
        LibrarySample {
            name: "syslog_kv".to_string(),
            description: "Generic syslog line with key=value pairs".to_string(),
            sample: "src=10.0.0.1 action=allow severity=critical user=alice".to_string(),
        },
        LibrarySample {
            name: "paloalto_traffic".to_string(),
            description: "Palo Alto TRAFFIC CSV log line".to_string(),
            sample: ",2024/01/15 10:30:45,007951000012345,TRAFFIC,end,2305,2024/01/15 10:30:44,192.168.1.100,10.0.0.50,0.0.0.0,0.0.0.0,rule1,,,web-browsing,vsys1,trust,untrust,ethernet1/1,ethernet1/2,default,2024/01/15 10:30:45,54321,1,54321,443,0,0,0x19,tcp,allow,1024,512,512,6,2024/01/15 10:30:44,0,any,0,7654321,0x0,192.168.1.0-24,10.0.0.0-24,0,6,0,0,,PA-VM,,,0,,,0,,,,,,,,,0,0,0,0,,PA-VM,,".to_string(),
        },
        LibrarySample {
            name: "versa_kvp".to_string(),
            description: "Versa Networks KVP-formatted log line".to_string(),
            sample: "2024-01-15T10:30:45+00:00 FLOW_MONITOR, flowId=123, sourcePort=54321, destPort=443, bytes=1024, appId=\"web-browsing\"".to_string(),
        },
        LibrarySample {
            name: "json_event".to_string(),
            description: "Single JSON object as received by the HTTP listener".to_string(),
            sample: r#"{"src":"10.0.0.1","action":"deny","severity":"high"}"#.to_string(),
        },
    ]
}

pub fn get(name: &str) -> Option<LibrarySample> {
    all().into_iter().find(|s| s.name == name)
}
