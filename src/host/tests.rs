use super::{HeadlessHost, HostEnvironment};
use url::Url;

#[test]
fn test_headless_host_tracks_location() {
    let host = HeadlessHost::parse("http://localhost/app?x=1").unwrap();
    assert_eq!(host.location().as_str(), "http://localhost/app?x=1");

    host.replace_location(Url::parse("http://localhost/app").unwrap());
    assert_eq!(host.location().as_str(), "http://localhost/app");
}

#[test]
fn test_frames_attach_and_detach() {
    let host = HeadlessHost::parse("http://localhost/").unwrap();
    let url = Url::parse("myapp://ping?data=%7B%7D").unwrap();

    let id = host.attach_frame(&url).unwrap();
    assert_eq!(host.attached_frames(), 1);

    host.detach_frame(id);
    assert_eq!(host.attached_frames(), 0);
    assert_eq!(host.launched(), vec![url]);
}

#[test]
fn test_refused_frames_error() {
    let host = HeadlessHost::parse("http://localhost/").unwrap();
    host.refuse_frames(true);
    let url = Url::parse("myapp://ping").unwrap();
    assert!(host.attach_frame(&url).is_err());
    assert!(host.launched().is_empty());
}

#[test]
fn test_clones_share_state() {
    let host = HeadlessHost::parse("http://localhost/").unwrap();
    let other = host.clone();
    other.attach_frame(&Url::parse("myapp://a").unwrap()).unwrap();
    assert_eq!(host.launched().len(), 1);
}
