//! Handshake-Tests: Server mit Client-Zertifikatspflicht ueber einen
//! In-Memory-Duplex-Stream.

use rustls::pki_types::ServerName;
use stammtisch_crypto::{
    mitglied_aus_zertifikaten, EntwicklungsCa, MtlsClient, MtlsClientConfig, MtlsServer,
    MtlsServerConfig,
};

fn server_fuer(ca: &EntwicklungsCa) -> MtlsServer {
    let server = ca.server_zertifikat(&["localhost"]).unwrap();
    MtlsServer::new(&MtlsServerConfig {
        zertifikat_pem: server.zertifikat_pem,
        schluessel_pem: server.schluessel_pem,
        ca_pem: ca.ca_pem().to_string(),
    })
    .unwrap()
}

fn servername() -> ServerName<'static> {
    ServerName::try_from("localhost").unwrap()
}

#[tokio::test]
async fn client_mit_gueltigem_zertifikat_wird_akzeptiert() {
    let ca = EntwicklungsCa::erzeugen("Test-CA").unwrap();
    let server = server_fuer(&ca);
    let alice = ca.client_zertifikat("alice").unwrap();
    let client = MtlsClient::new(&MtlsClientConfig::neu(
        ca.ca_pem().to_string(),
        alice.zertifikat_pem,
        alice.schluessel_pem,
    ))
    .unwrap();

    let (a, b) = tokio::io::duplex(16 * 1024);
    let (akzeptiert, verbunden) = tokio::join!(
        server.acceptor.accept(a),
        client.connector.connect(servername(), b)
    );

    let stream = akzeptiert.expect("Server-Handshake");
    verbunden.expect("Client-Handshake");

    let (_, verbindung) = stream.get_ref();
    let mitglied = mitglied_aus_zertifikaten(verbindung.peer_certificates());
    assert_eq!(mitglied.name, "alice");
}

#[tokio::test]
async fn client_ohne_zertifikat_wird_abgelehnt() {
    let ca = EntwicklungsCa::erzeugen("Test-CA").unwrap();
    let server = server_fuer(&ca);
    let client = MtlsClient::new(&MtlsClientConfig::ohne_zertifikat(ca.ca_pem().to_string())).unwrap();

    let (a, b) = tokio::io::duplex(16 * 1024);
    let (akzeptiert, _verbunden) = tokio::join!(
        server.acceptor.accept(a),
        client.connector.connect(servername(), b)
    );

    assert!(akzeptiert.is_err());
}

#[tokio::test]
async fn zertifikat_fremder_ca_wird_abgelehnt() {
    let ca = EntwicklungsCa::erzeugen("Test-CA").unwrap();
    let fremde_ca = EntwicklungsCa::erzeugen("Fremde-CA").unwrap();
    let server = server_fuer(&ca);

    let mallory = fremde_ca.client_zertifikat("mallory").unwrap();
    let client = MtlsClient::new(&MtlsClientConfig::neu(
        ca.ca_pem().to_string(),
        mallory.zertifikat_pem,
        mallory.schluessel_pem,
    ))
    .unwrap();

    let (a, b) = tokio::io::duplex(16 * 1024);
    let (akzeptiert, _verbunden) = tokio::join!(
        server.acceptor.accept(a),
        client.connector.connect(servername(), b)
    );

    assert!(akzeptiert.is_err());
}
