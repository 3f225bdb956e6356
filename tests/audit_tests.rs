//! End-to-end tests: configuration, routing dump and syslog through the
//! public API.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use excessive_acl::{
    compile_access_entry, compile_access_lists, interface_names, parse_access_groups,
    theoretical_capacity, Action, AddressRange, AuditOptions, AuditReport, Auditor, ErrorKind,
    Flow, NilResolver, ObjectResolver, PortRange, Protocol, RoutingEntry, RoutingTable,
    StaticResolver, TextIndex, DEFAULT_CACHE_SIZE,
};

const SH_RUN: &str = "\
hostname fw01
interface GigabitEthernet0/0
 nameif outside
 security-level 0
 ip address 123.123.123.10 255.255.255.0
interface GigabitEthernet0/1
 nameif inside
 security-level 100
 ip address 10.10.9.1 255.255.255.0
interface GigabitEthernet0/2
 nameif dmz
 security-level 50
 ip address 172.16.16.1 255.255.255.0
interface Management0/0
 no nameif
object network WEB01
 host 172.16.16.16
object network WEB02
 host 172.16.16.17
 nat (dmz,outside) static 123.123.123.11
object network PARTNER
 fqdn v4 partner.example.com
object-group network WEB-SERVERS
 description public web servers
 network-object object WEB01
 network-object object WEB02
object-group network ALL-SERVERS
 group-object WEB-SERVERS
 network-object 172.16.17.0 255.255.255.0
object-group service WEB-PORTS tcp
 port-object eq www
 port-object eq https
object service SSH
 service tcp destination eq ssh
object-group service ADMIN
 service-object object SSH
 service-object icmp echo
object-group protocol TRANSPORT
 protocol-object tcp
 protocol-object udp
access-list outside_in remark published services
access-list outside_in extended permit tcp any object-group WEB-SERVERS object-group WEB-PORTS
access-list outside_in extended permit object-group ADMIN object PARTNER object-group ALL-SERVERS
access-list outside_in extended deny ip any any log
access-list inside_in extended permit object-group TRANSPORT 10.10.9.0 255.255.255.0 any
access-list inside_in extended permit icmp any any
access-group outside_in in interface outside
access-group inside_in in interface inside
";

const SH_ROUTE: &str = "\
Codes: L - local, C - connected, S - static, R - RIP, M - mobile, B - BGP
       D - EIGRP, EX - EIGRP external, O - OSPF, IA - OSPF inter area

Gateway of last resort is 123.123.123.2 to network 0.0.0.0

S*       0.0.0.0 0.0.0.0 [1/0] via 123.123.123.2, outside
C        10.10.9.0 255.255.255.0 is directly connected, inside
L        10.10.9.1 255.255.255.255 is directly connected, inside
C        123.123.123.0 255.255.255.0 is directly connected, outside
C        172.16.16.0 255.255.255.0 is directly connected, dmz
S        172.16.17.0 255.255.255.0 [1/0] via 172.16.16.254
";

const SYSLOG: &str = "\
Oct 10 2023 10:00:00 fw01 : %ASA-6-302013: Built inbound TCP connection 54 for outside:150.150.150.150/57346 (150.150.150.150/57346) to dmz:172.16.16.16/443 (123.123.123.10/443)
Oct 10 2023 10:00:01 fw01 : %ASA-6-302013: Built inbound TCP connection 55 for outside:150.150.150.151/57347 (150.150.150.151/57347) to dmz:172.16.16.16/443 (123.123.123.10/443)
Oct 10 2023 10:00:02 fw01 : %ASA-6-302013: Built inbound TCP connection 56 for outside:198.51.100.7/40000 (198.51.100.7/40000) to dmz:172.16.17.5/22 (123.123.123.12/22)
Oct 10 2023 10:00:03 fw01 : %ASA-6-302020: Built inbound ICMP connection for faddr 198.51.100.7/4 gaddr 123.123.123.12/0 laddr 172.16.17.5/0 type 8 code 0
Oct 10 2023 10:00:04 fw01 : %ASA-6-302015: Built outbound UDP connection 57 for outside:8.8.8.8/53 (8.8.8.8/53) to inside:10.10.9.9/51000 (123.123.123.10/51000)
Oct 10 2023 10:00:05 fw01 : %ASA-4-106023: Deny tcp src outside:203.0.113.9/41000 dst dmz:172.16.16.17/3389 by access-group \"outside_in\" [0x0, 0x0]
Oct 10 2023 10:00:06 fw01 : %ASA-6-302014: Teardown TCP connection 54 for outside:150.150.150.150/57346 to dmz:172.16.16.16/443 duration 0:00:01 bytes 1024
";

fn names() -> StaticResolver {
    StaticResolver::new().with_mapping("partner.example.com", "198.51.100.7".parse().unwrap())
}

fn auditor(options: AuditOptions) -> Auditor {
    let config = TextIndex::new(SH_RUN);
    let groups = parse_access_groups(&config);
    let lists = compile_access_lists(&config, &groups, &names(), &options).unwrap();
    let routes = RoutingTable::parse(SH_ROUTE, &interface_names(&config).unwrap()).unwrap();
    Auditor::new(lists, groups, routes, options)
}

fn temp_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("excessive-acl-{}-{}", std::process::id(), name));
    std::fs::write(&path, contents).unwrap();
    path
}

fn ip(a: u8, b: u8, c: u8, d: u8) -> u32 {
    u32::from(Ipv4Addr::new(a, b, c, d))
}

mod compile_tests {
    use super::*;

    #[test]
    fn test_access_lists_follow_access_groups() {
        let auditor = auditor(AuditOptions::default());
        let names: Vec<&str> = auditor.access_lists().iter().map(|l| l.name()).collect();
        assert_eq!(names, vec!["outside_in", "inside_in"]);
    }

    #[test]
    fn test_outside_in_expansion() {
        let auditor = auditor(AuditOptions::default());
        let acl = &auditor.access_lists()[0];
        assert_eq!(acl.entries().len(), 4);

        // remark
        assert!(acl.entries()[0].compiled().is_empty());

        // 2 servers x 2 ports
        let web = acl.entries()[1].compiled();
        assert_eq!(web.len(), 4);
        assert!(web.iter().all(|c| c.protocol == Protocol::TCP && c.src_addr.is_any()));
        assert_eq!(web[0].dst_addr, AddressRange::host(ip(172, 16, 16, 16)));
        assert_eq!(web[0].dst_port, PortRange::single(80));
        assert_eq!(web[1].dst_port, PortRange::single(443));
        assert_eq!(web[2].dst_addr, AddressRange::host(ip(172, 16, 16, 17)));

        // (ssh, echo) x partner x (2 hosts + one /24)
        let admin = acl.entries()[2].compiled();
        assert_eq!(admin.len(), 6);
        assert!(admin
            .iter()
            .all(|c| c.src_addr == AddressRange::host(ip(198, 51, 100, 7))));
        assert_eq!(admin[0].protocol, Protocol::TCP);
        assert_eq!(admin[0].dst_port, PortRange::single(22));
        assert_eq!(admin[3].protocol, Protocol::ICMP);
        assert_eq!(admin[3].icmp.icmp_type, 8);
        assert_eq!(
            admin[5].dst_addr,
            AddressRange::new(ip(172, 16, 17, 0), ip(172, 16, 17, 255))
        );

        let deny = acl.entries()[3].compiled();
        assert_eq!(deny.len(), 1);
        assert_eq!(deny[0].action, Action::Deny);
        assert_eq!(deny[0].protocol, Protocol::IP);
    }

    #[test]
    fn test_protocol_group_expands_per_protocol() {
        let auditor = auditor(AuditOptions::default());
        let acl = &auditor.access_lists()[1];
        let transport = acl.entries()[0].compiled();
        assert_eq!(transport.len(), 2);
        assert_eq!(transport[0].protocol, Protocol::TCP);
        assert_eq!(transport[1].protocol, Protocol::UDP);
        assert_eq!(
            transport[0].src_addr,
            AddressRange::new(ip(10, 10, 9, 0), ip(10, 10, 9, 255))
        );
    }

    #[test]
    fn test_single_host_entry_matches_tcp_only() {
        let config = TextIndex::new("");
        let objects = ObjectResolver::new(&config, &NilResolver, DEFAULT_CACHE_SIZE);
        let entry = compile_access_entry(
            "access-list X extended permit tcp host 10.10.10.10 host 10.10.10.1",
            &objects,
        )
        .unwrap();
        assert_eq!(entry.compiled().len(), 1);

        let compiled = &entry.compiled()[0];
        assert_eq!(compiled.src_addr, AddressRange::host(ip(10, 10, 10, 10)));
        assert_eq!(compiled.dst_addr, AddressRange::host(ip(10, 10, 10, 1)));
        assert!(compiled.src_port.is_wildcard() && compiled.dst_port.is_wildcard());

        let tcp = Flow::transport(
            Protocol::TCP,
            "inside",
            Ipv4Addr::new(10, 10, 10, 10),
            1111,
            "outside",
            Ipv4Addr::new(10, 10, 10, 1),
            80,
        );
        let mut udp = tcp.clone();
        udp.protocol = Protocol::UDP;
        assert!(compiled.matches(&tcp));
        assert!(!compiled.matches(&udp));
    }

    #[test]
    fn test_missing_object_fails_compilation() {
        let config = TextIndex::new(
            "\
access-list a extended permit ip object-group NOPE any
access-group a in interface inside
",
        );
        let groups = parse_access_groups(&config);
        let err = compile_access_lists(&config, &groups, &NilResolver, &AuditOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resolution);
        assert!(err.to_string().contains("NOPE"), "got: {}", err);
    }

    #[test]
    fn test_group_cycle_is_reported() {
        let config = TextIndex::new(
            "\
object-group network A
 group-object B
object-group network B
 group-object A
access-list a extended permit ip object-group A any
access-group a in interface inside
",
        );
        let groups = parse_access_groups(&config);
        let err = compile_access_lists(&config, &groups, &NilResolver, &AuditOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resolution);
        assert!(err.to_string().contains("cycle"), "got: {}", err);
    }
}

mod routing_tests {
    use super::*;

    #[test]
    fn test_routing_dump() {
        let config = TextIndex::new(SH_RUN);
        let interfaces = interface_names(&config).unwrap();
        assert_eq!(interfaces.len(), 3);

        let routes = RoutingTable::parse(SH_ROUTE, &interfaces).unwrap();
        assert_eq!(routes.get_iface(ip(10, 10, 9, 9)).unwrap(), "inside");
        assert_eq!(routes.get_iface(ip(172, 16, 16, 16)).unwrap(), "dmz");
        // recursive route through a dmz next hop
        assert_eq!(routes.get_iface(ip(172, 16, 17, 5)).unwrap(), "dmz");
        assert_eq!(routes.get_iface(ip(8, 8, 8, 8)).unwrap(), "outside");
    }

    #[test]
    fn test_containment_lookup() {
        let subnet = |a, b, c, d, len: u32| {
            let start = ip(a, b, c, d);
            let size = if len == 0 { u32::MAX } else { (1u32 << (32 - len)) - 1 };
            AddressRange::new(start, start | size)
        };
        let routes = RoutingTable::build(vec![
            RoutingEntry::connected(subnet(0, 0, 0, 0, 0), "outside"),
            RoutingEntry::connected(subnet(10, 0, 0, 0, 8), "inside"),
            RoutingEntry::connected(subnet(10, 10, 0, 0, 16), "outside"),
            RoutingEntry::connected(subnet(10, 10, 10, 0, 24), "inside"),
        ])
        .unwrap();

        assert_eq!(routes.get_iface(ip(10, 10, 10, 10)).unwrap(), "inside");
        assert_eq!(routes.get_iface(ip(10, 10, 3, 4)).unwrap(), "outside");
        assert_eq!(routes.get_iface(ip(1, 2, 3, 4)).unwrap(), "outside");
    }

    #[test]
    fn test_config_without_nameif() {
        let err = interface_names(&TextIndex::new("hostname fw01\n")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Routing);
    }
}

mod replay_tests {
    use super::*;

    #[tokio::test]
    async fn test_replay_and_report() {
        let auditor = auditor(AuditOptions::default());
        let lines: Vec<String> = SYSLOG.lines().map(str::to_string).collect();
        let stats = auditor.replay_records(lines).await.unwrap();

        assert_eq!(stats.records, 7);
        assert_eq!(stats.flows, 6);
        // every flow hits some entry: the rdp attempt lands on the final deny
        assert_eq!(stats.matched, 6);

        let outside = &auditor.access_lists()[0];
        let web = outside.entries()[1].compiled();
        assert_eq!(web[1].matched_count(), 2);

        let admin = outside.entries()[2].compiled();
        // ssh and echo to the /24 behind the recursive route
        assert_eq!(admin[2].matched_count(), 1);
        assert_eq!(admin[5].matched_count(), 1);

        let deny = &outside.entries()[3].compiled()[0];
        assert_eq!(deny.matched_count(), 1);

        let inside = &auditor.access_lists()[1];
        // outbound connection: inside host talks to 8.8.8.8 over udp
        assert_eq!(inside.entries()[0].compiled()[1].matched_count(), 1);

        let report = AuditReport::build(auditor.access_lists()).unwrap();
        let https = report
            .entries()
            .find(|e| e.rule.contains("172.16.16.16-172.16.16.16:443-443"))
            .unwrap();
        assert_eq!(https.capacity.theoretical, 1);
        assert_eq!(https.capacity.observed, 1);
        assert_eq!(https.flows.len(), 2);

        let text = report.to_string();
        assert!(text.contains("ACL: outside_in"));
        assert!(text.contains("ACL: inside_in"));
        assert!(text.contains("\tACE: access-list outside_in remark published services"));
    }

    #[tokio::test]
    async fn test_replay_file() {
        let path = temp_file("syslog.log", SYSLOG);
        let auditor = auditor(AuditOptions::new().with_workers(2).with_queue_capacity(2));
        let stats = auditor.replay_file(&path).await;
        std::fs::remove_file(&path).unwrap();

        let stats = stats.unwrap();
        assert_eq!(stats.records, 7);
        assert_eq!(stats.flows, 6);
    }

    #[tokio::test]
    async fn test_unroutable_icmp_record_aborts() {
        let config = TextIndex::new(SH_RUN);
        let groups = parse_access_groups(&config);
        let lists =
            compile_access_lists(&config, &groups, &names(), &AuditOptions::default()).unwrap();
        let routes = RoutingTable::build(vec![RoutingEntry::connected(
            AddressRange::new(ip(10, 10, 9, 0), ip(10, 10, 9, 255)),
            "inside",
        )])
        .unwrap();
        let auditor = Auditor::new(lists, groups, routes, AuditOptions::default());

        let err = auditor
            .replay_records(vec![
                "%ASA-6-302020: Built inbound ICMP connection for faddr 198.51.100.7/4 gaddr 123.123.123.12/0 laddr 172.16.17.5/0 type 8 code 0",
            ])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Routing);
    }
}

mod capacity_tests {
    use super::*;
    use excessive_acl::CompiledEntry;

    #[test]
    fn test_inverted_range_has_zero_capacity() {
        let entry = CompiledEntry::new(
            Action::Permit,
            Protocol::IP,
            AddressRange::new(1, 0),
            AddressRange::ANY,
        );
        assert_eq!(theoretical_capacity(&entry).unwrap(), 0);
    }

    #[test]
    fn test_fixed_source_port_wildcard_destination() {
        let src = AddressRange::new(ip(10, 0, 0, 0), ip(10, 0, 0, 255));
        let dst = AddressRange::new(ip(192, 168, 0, 0), ip(192, 168, 0, 3));
        let entry = CompiledEntry::new(Action::Permit, Protocol::TCP, src, dst)
            .with_ports(PortRange::single(1024), PortRange::WILDCARD);
        assert_eq!(theoretical_capacity(&entry).unwrap(), 256 * 4 * 65536);
    }
}
